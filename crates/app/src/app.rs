use std::path::PathBuf;
use std::sync::Arc;

use chirp_channel::MessageChannel;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::chat::{ChatView, ProfileConfirmed};
use crate::profile::ProfileSetupView;

/// Returns the default themes directory path.
pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;

fn window_toolbar_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

gpui::actions!(shell, [Quit]);

/// Which screen the shell shows. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AppPhase {
    #[default]
    ProfileSetup,
    Chat,
}

impl AppPhase {
    /// Moves from profile setup to chat. Returns false when already chatting.
    pub fn advance(&mut self) -> bool {
        match self {
            AppPhase::ProfileSetup => {
                *self = AppPhase::Chat;
                true
            }
            AppPhase::Chat => false,
        }
    }
}

/// Root layout: title bar, then either the profile form or the chat view.
pub struct ChatAppShell {
    notification_list: Entity<NotificationList>,
    phase: AppPhase,
    profile_setup: Entity<ProfileSetupView>,
    chat_view: Entity<ChatView>,
    title_bar_should_move: bool,
}

impl ChatAppShell {
    pub fn new(
        notification_list: Entity<NotificationList>,
        channel: Arc<dyn MessageChannel>,
        avatar_style: &str,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let profile_setup = cx.new(|cx| ProfileSetupView::new(avatar_style, window, cx));
        let chat_view = cx.new(|cx| ChatView::new(channel, window, cx));

        cx.subscribe(&profile_setup, |this, _, event: &ProfileConfirmed, cx| {
            this.handle_profile_confirmed(event.clone(), cx);
        })
        .detach();

        Self {
            notification_list,
            phase: AppPhase::default(),
            profile_setup,
            chat_view,
            title_bar_should_move: false,
        }
    }

    fn handle_profile_confirmed(&mut self, event: ProfileConfirmed, cx: &mut Context<Self>) {
        if !self.phase.advance() {
            return;
        }

        self.chat_view.update(cx, |chat_view, cx| {
            chat_view.activate(event.profile, cx);
        });
        cx.notify();
    }
}

impl Render for ChatAppShell {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let toolbar_height = window_toolbar_height(window);
        let content = match self.phase {
            AppPhase::ProfileSetup => self.profile_setup.clone().into_any_element(),
            AppPhase::Chat => self.chat_view.clone().into_any_element(),
        };

        div()
            .size_full()
            .relative()
            .bg(theme.background)
            .child(
                v_flex().size_full().child(
                    v_flex()
                        .id("main-content")
                        .flex_1()
                        .min_w_0()
                        .min_h_0()
                        .pt(toolbar_height)
                        .overflow_hidden()
                        .child(content),
                ),
            )
            .child(
                div()
                    .absolute()
                    .top_0()
                    .left_0()
                    .right_0()
                    .child(self.render_top_bar(window, toolbar_height, cx)),
            )
            .child(self.notification_list.clone())
    }
}

impl ChatAppShell {
    fn render_top_bar(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();
        let channel_id = self.chat_view.read(cx).channel_id().to_string();

        h_flex()
            .id("app-top-bar")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .items_center()
            .justify_between()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(
                div()
                    .text_sm()
                    .font_weight(FontWeight::SEMIBOLD)
                    .text_color(theme.foreground)
                    .child("Chat"),
            )
            .child(
                h_flex().gap_2().items_center().child(
                    div()
                        .id("app-channel-id")
                        .px_2()
                        .py_1()
                        .rounded_full()
                        .bg(theme.muted)
                        .border_1()
                        .border_color(theme.border)
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child(channel_id),
                ),
            )
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
            .child(self.render_linux_window_controls(window, cx))
    }

    fn render_linux_window_controls(&self, window: &Window, cx: &Context<Self>) -> AnyElement {
        #[cfg(target_os = "linux")]
        {
            let maximize_icon = if window.is_maximized() {
                IconName::WindowRestore
            } else {
                IconName::WindowMaximize
            };

            h_flex()
                .id("linux-window-controls")
                .items_center()
                // Keep control clicks out of title bar drag and double-click handling.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .gap_2()
                .ml_2()
                .child(
                    Button::new("linux-window-minimize")
                        .ghost()
                        .small()
                        .icon(IconName::WindowMinimize)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.minimize_window();
                        })),
                )
                .child(
                    Button::new("linux-window-maximize")
                        .ghost()
                        .small()
                        .icon(maximize_icon)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.zoom_window();
                        })),
                )
                .child(
                    Button::new("linux-window-close")
                        .ghost()
                        .small()
                        .icon(IconName::WindowClose)
                        .on_click(cx.listener(|_, _, window, _| {
                            window.remove_window();
                        })),
                )
                .into_any_element()
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = (window, cx);
            div().into_any_element()
        }
    }
}
