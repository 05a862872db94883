use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
};

use crate::chat::events::Submit;

pub struct MessageInput {
    input_state: Entity<InputState>,
}

impl EventEmitter<Submit> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Type a message...")
                .clean_on_escape()
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                if let InputEvent::PressEnter { .. } = event {
                    this.handle_submit(window, cx);
                }
            },
        )
        .detach();

        Self { input_state }
    }

    pub fn clear(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            state.set_value("", window, cx);
        });
    }

    fn handle_submit(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let content = self.input_state.read(cx).value().to_string();
        if content.trim().is_empty() {
            tracing::warn!("message is empty");
            return;
        }

        cx.emit(Submit::new(content));
        self.clear(window, cx);
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        h_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .border_t_1()
            .border_color(theme.border)
            .child(
                div()
                    .flex_1()
                    .min_w_0()
                    .px_3()
                    .py_1()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .child(Input::new(&self.input_state).w_full()),
            )
            .child(
                Button::new("send")
                    .small()
                    .primary()
                    .icon(IconName::ArrowUp)
                    .child("Send")
                    .on_click(cx.listener(|this, _, window, cx| {
                        this.handle_submit(window, cx);
                    })),
            )
    }
}
