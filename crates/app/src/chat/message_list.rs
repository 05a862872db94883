use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::ops::Range;
use std::rc::Rc;

use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, Icon, IconName, h_flex, label::Label, v_flex, v_virtual_list,
};

use crate::chat::message::{Alignment, ChatMessage, DEFAULT_AVATAR, MessageRow};
use crate::chat::scroll_manager::ScrollManager;

const DEFAULT_CONTENT_WIDTH: Pixels = px(680.);
const LIST_HORIZONTAL_PADDING: Pixels = px(16.);
const CONTENT_WIDTH_CHANGE_EPSILON: f32 = 1.0;
const AVATAR_SIZE: Pixels = px(32.);
const AVATAR_GAP: Pixels = px(8.);
const BUBBLE_MAX_WIDTH: Pixels = px(480.);
const BUBBLE_PADDING_X: Pixels = px(12.);
const BUBBLE_PADDING_Y: Pixels = px(8.);
const SENDER_LABEL_HEIGHT: Pixels = px(16.);
const SENDER_LABEL_GAP: Pixels = px(4.);
const ESTIMATED_TEXT_LINE_HEIGHT: Pixels = px(18.);
const ESTIMATED_CHAR_WIDTH: f32 = 7.0;

struct SizeCacheEntry {
    layout_hash: u64,
    height: Pixels,
    measured: bool,
}

/// Per-row height cache plus the size list handed to the virtual list.
#[derive(Default)]
struct RowSizes {
    cache: Vec<SizeCacheEntry>,
    sizes: Rc<Vec<Size<Pixels>>>,
}

impl RowSizes {
    /// Adds an estimate for one new trailing row, leaving earlier entries alone.
    fn push(&mut self, row: &MessageRow, content_width: Pixels) {
        let height = estimate_row_height(row, content_width);
        self.cache.push(SizeCacheEntry {
            layout_hash: layout_hash(row),
            height,
            measured: false,
        });
        Rc::make_mut(&mut self.sizes).push(size(px(0.), height));
    }

    fn rebuild(&mut self, rows: &[MessageRow], content_width: Pixels) {
        self.cache.truncate(rows.len());

        let mut sizes = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let next_hash = layout_hash(row);
            let estimated_height = estimate_row_height(row, content_width);

            match self.cache.get_mut(index) {
                Some(entry) if entry.layout_hash != next_hash => {
                    entry.layout_hash = next_hash;
                    entry.height = estimated_height;
                    entry.measured = false;
                }
                Some(entry) if !entry.measured => entry.height = estimated_height,
                Some(_) => {}
                None => self.cache.push(SizeCacheEntry {
                    layout_hash: next_hash,
                    height: estimated_height,
                    measured: false,
                }),
            }

            sizes.push(size(px(0.), self.cache[index].height));
        }

        self.sizes = Rc::new(sizes);
    }

    fn invalidate_measurements(&mut self) {
        for entry in &mut self.cache {
            entry.measured = false;
        }
    }

    /// Records a measured height. Returns true when the stored height changed.
    fn record_measurement(&mut self, index: usize, height: Pixels) -> bool {
        let Some(entry) = self.cache.get_mut(index) else {
            return false;
        };

        let changed = !entry.measured || pixels_changed(entry.height, height);
        entry.height = height;
        entry.measured = true;
        changed
    }
}

/// Re-aligns rows in place. Returns true when any row switched sides.
fn reclassify_rows(rows: &mut [MessageRow], local_name: &str) -> bool {
    let mut changed = false;
    for row in rows {
        let alignment = if row.sender == local_name {
            Alignment::Sent
        } else {
            Alignment::Received
        };
        if row.alignment != alignment {
            row.alignment = alignment;
            changed = true;
        }
    }
    changed
}

/// Virtualized message column. Rows are keyed by position since the log only grows.
pub struct MessageList {
    rows: Vec<MessageRow>,
    local_name: String,
    row_sizes: RowSizes,
    scroll_manager: ScrollManager,
    content_width: Option<Pixels>,
}

impl MessageList {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            rows: Vec::new(),
            local_name: String::new(),
            row_sizes: RowSizes::default(),
            scroll_manager: ScrollManager::new(),
            content_width: None,
        }
    }

    /// Appends one accepted message and follows the conversation to the bottom.
    pub fn push_message(&mut self, message: &ChatMessage, cx: &mut Context<Self>) {
        let row = MessageRow::new(message, &self.local_name);
        self.row_sizes
            .push(&row, self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH));
        self.rows.push(row);
        self.scroll_manager.request_scroll_to_bottom();
        cx.notify();
    }

    /// Re-classifies every row against a new local display name.
    pub fn set_local_name(&mut self, local_name: impl Into<String>, cx: &mut Context<Self>) {
        self.local_name = local_name.into();
        if reclassify_rows(&mut self.rows, &self.local_name) {
            self.rebuild_item_sizes();
        }
        cx.notify();
    }

    pub fn request_scroll_to_bottom(&mut self, cx: &mut Context<Self>) {
        self.scroll_manager.request_scroll_to_bottom();
        cx.notify();
    }

    fn update_content_width(&mut self, cx: &mut Context<Self>) {
        let list_width = self.scroll_manager.bounds().size.width;
        if list_width <= Pixels::ZERO {
            return;
        }

        let next_content_width = max_pixels(px(1.), list_width - LIST_HORIZONTAL_PADDING * 2);
        let width_changed = self.content_width.is_none_or(|current| {
            (f32::from(current) - f32::from(next_content_width)).abs()
                > CONTENT_WIDTH_CHANGE_EPSILON
        });

        if width_changed {
            self.content_width = Some(next_content_width);
            self.row_sizes.invalidate_measurements();
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn rebuild_item_sizes(&mut self) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        self.row_sizes.rebuild(&self.rows, content_width);
    }

    fn measure_visible_items(
        &mut self,
        visible_range: Range<usize>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) {
        let content_width = self.content_width.unwrap_or(DEFAULT_CONTENT_WIDTH);
        let available_space = size(
            AvailableSpace::Definite(content_width),
            AvailableSpace::MinContent,
        );
        let mut updated = false;

        for index in visible_range {
            let Some(row) = self.rows.get(index).cloned() else {
                continue;
            };

            let mut element = self.render_row(&row, index, cx);
            let measured_height = element.layout_as_root(available_space, window, cx).height;
            updated |= self.row_sizes.record_measurement(index, measured_height);
        }

        if updated {
            self.rebuild_item_sizes();
            cx.notify();
        }
    }

    fn render_row(&self, row: &MessageRow, index: usize, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let is_sent = row.alignment == Alignment::Sent;

        let avatar = div()
            .id(("message-avatar", index))
            .flex_none()
            .size(AVATAR_SIZE)
            .rounded_full()
            .overflow_hidden()
            .bg(theme.muted)
            .flex()
            .items_center()
            .justify_center()
            .map(|el| {
                if row.avatar == DEFAULT_AVATAR {
                    el.child(
                        Icon::new(IconName::CircleUser)
                            .size(px(20.))
                            .text_color(theme.foreground),
                    )
                } else {
                    el.child(img(SharedString::from(row.avatar.clone())).size_full())
                }
            });

        let (bubble_bg, bubble_fg) = if is_sent {
            (theme.accent, theme.accent_foreground)
        } else {
            (theme.secondary, theme.secondary_foreground)
        };

        let body = v_flex()
            .max_w(BUBBLE_MAX_WIDTH)
            .gap(SENDER_LABEL_GAP)
            .when(is_sent, |column| column.items_end())
            .child(
                Label::new(row.sender.clone())
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.6)),
            )
            .child(
                div()
                    .px(BUBBLE_PADDING_X)
                    .py(BUBBLE_PADDING_Y)
                    .rounded_lg()
                    .bg(bubble_bg)
                    .text_color(bubble_fg)
                    .child(Label::new(row.text.clone()).text_sm()),
            );

        h_flex()
            .w_full()
            .items_start()
            .gap(AVATAR_GAP)
            .when(is_sent, |line| line.flex_row_reverse())
            .child(avatar)
            .child(body)
            .into_any_element()
    }
}

impl Render for MessageList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        self.update_content_width(cx);
        if self.scroll_manager.apply_pending_scroll() && self.scroll_manager.is_pending() {
            cx.notify();
        }

        v_flex().size_full().min_h_0().child(
            v_virtual_list(
                cx.entity().clone(),
                "message-list",
                self.row_sizes.sizes.clone(),
                |this, visible_range, window, cx| {
                    this.update_content_width(cx);
                    this.measure_visible_items(visible_range.clone(), window, cx);
                    visible_range
                        .filter_map(|index| {
                            this.rows
                                .get(index)
                                .map(|row| this.render_row(row, index, cx))
                        })
                        .collect::<Vec<_>>()
                },
            )
            .size_full()
            .px_4()
            .py_3()
            .gap_3()
            .track_scroll(self.scroll_manager.handle()),
        )
    }
}

fn layout_hash(row: &MessageRow) -> u64 {
    let mut hasher = DefaultHasher::new();

    hasher.write_u8(match row.alignment {
        Alignment::Sent => 0,
        Alignment::Received => 1,
    });
    hasher.write(row.sender.as_bytes());
    hasher.write_u8(0xff);
    hasher.write(row.text.as_bytes());
    hasher.finish()
}

fn estimate_row_height(row: &MessageRow, content_width: Pixels) -> Pixels {
    let body_width = min_pixels(
        max_pixels(px(1.), content_width - AVATAR_SIZE - AVATAR_GAP),
        BUBBLE_MAX_WIDTH,
    );
    let text_width = max_pixels(px(1.), body_width - BUBBLE_PADDING_X * 2);
    let body_height = SENDER_LABEL_HEIGHT
        + SENDER_LABEL_GAP
        + estimate_text_height(&row.text, text_width)
        + BUBBLE_PADDING_Y * 2;

    max_pixels(AVATAR_SIZE, body_height)
}

fn estimate_text_height(content: &str, width: Pixels) -> Pixels {
    if content.is_empty() {
        return ESTIMATED_TEXT_LINE_HEIGHT;
    }

    let chars_per_line = (f32::from(width) / ESTIMATED_CHAR_WIDTH).floor().max(1.0) as usize;

    let mut line_count = 0usize;
    for line in content.lines() {
        let char_count = line.chars().count().max(1);
        line_count += char_count.div_ceil(chars_per_line);
    }

    if content.ends_with('\n') {
        line_count += 1;
    }

    ESTIMATED_TEXT_LINE_HEIGHT * line_count.max(1)
}

fn max_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) >= f32::from(b) { a } else { b }
}

fn min_pixels(a: Pixels, b: Pixels) -> Pixels {
    if f32::from(a) <= f32::from(b) { a } else { b }
}

fn pixels_changed(a: Pixels, b: Pixels) -> bool {
    (f32::from(a) - f32::from(b)).abs() > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(alignment: Alignment, sender: &str, text: &str) -> MessageRow {
        MessageRow {
            alignment,
            sender: sender.to_string(),
            text: text.to_string(),
            avatar: DEFAULT_AVATAR.to_string(),
        }
    }

    #[::core::prelude::v1::test]
    fn short_rows_are_at_least_avatar_height() {
        let height = estimate_row_height(&row(Alignment::Received, "Carol", "yo"), px(680.));

        assert!(height >= AVATAR_SIZE);
        assert_eq!(
            height,
            SENDER_LABEL_HEIGHT + SENDER_LABEL_GAP + ESTIMATED_TEXT_LINE_HEIGHT + BUBBLE_PADDING_Y * 2
        );
    }

    #[::core::prelude::v1::test]
    fn long_text_wraps_within_bubble_width() {
        let short = estimate_row_height(&row(Alignment::Sent, "Bob", "hi"), px(680.));
        let long = estimate_row_height(&row(Alignment::Sent, "Bob", &"word ".repeat(200)), px(680.));
        let narrow = estimate_row_height(&row(Alignment::Sent, "Bob", &"word ".repeat(200)), px(240.));

        assert!(long > short);
        assert!(narrow > long);
    }

    #[::core::prelude::v1::test]
    fn layout_hash_tracks_alignment_and_content() {
        let received = row(Alignment::Received, "Bob", "hi");
        let sent = row(Alignment::Sent, "Bob", "hi");

        assert_eq!(layout_hash(&received), layout_hash(&received.clone()));
        assert_ne!(layout_hash(&received), layout_hash(&sent));
        assert_ne!(
            layout_hash(&row(Alignment::Sent, "Bo", "bhi")),
            layout_hash(&row(Alignment::Sent, "Bob", "hi"))
        );
    }

    #[::core::prelude::v1::test]
    fn large_history_keeps_row_heights_positive() {
        let rows = (0..2_000)
            .map(|index| {
                let alignment = if index % 3 == 0 {
                    Alignment::Sent
                } else {
                    Alignment::Received
                };
                row(alignment, "sender", &format!("message-{index}"))
            })
            .collect::<Vec<_>>();

        assert!(
            rows.iter()
                .all(|row| estimate_row_height(row, px(680.)) > Pixels::ZERO)
        );
    }

    #[::core::prelude::v1::test]
    fn pushing_a_row_keeps_measured_heights() {
        let rows = vec![
            row(Alignment::Received, "Alice", "one"),
            row(Alignment::Received, "Carol", "two"),
        ];
        let mut sizes = RowSizes::default();
        sizes.rebuild(&rows, px(680.));
        assert!(sizes.record_measurement(0, px(77.)));
        assert!(!sizes.record_measurement(0, px(77.)));
        sizes.rebuild(&rows, px(680.));

        sizes.push(&row(Alignment::Sent, "Bob", "three"), px(680.));

        assert_eq!(sizes.cache.len(), 3);
        assert_eq!(sizes.sizes.len(), 3);
        assert_eq!(sizes.sizes[0].height, px(77.));
        assert!(sizes.cache[0].measured);
        assert!(!sizes.cache[2].measured);
        assert_eq!(
            sizes.sizes[2].height,
            estimate_row_height(&row(Alignment::Sent, "Bob", "three"), px(680.))
        );
    }

    #[::core::prelude::v1::test]
    fn pushed_rows_match_a_full_rebuild() {
        let rows = (0..50)
            .map(|index| row(Alignment::Received, "sender", &"word ".repeat(index)))
            .collect::<Vec<_>>();

        let mut pushed = RowSizes::default();
        for row in &rows {
            pushed.push(row, px(420.));
        }
        let mut rebuilt = RowSizes::default();
        rebuilt.rebuild(&rows, px(420.));

        assert_eq!(pushed.sizes, rebuilt.sizes);
    }

    #[::core::prelude::v1::test]
    fn reclassifying_switches_only_matching_senders() {
        let mut rows = vec![
            row(Alignment::Received, "Bob", "hi"),
            row(Alignment::Received, "Carol", "yo"),
        ];

        assert!(reclassify_rows(&mut rows, "Bob"));
        assert_eq!(rows[0].alignment, Alignment::Sent);
        assert_eq!(rows[1].alignment, Alignment::Received);
        assert!(!reclassify_rows(&mut rows, "Bob"));
    }
}
