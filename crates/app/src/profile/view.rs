use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

use crate::chat::events::ProfileConfirmed;
use crate::profile::state::{ProfileDraft, avatar_gallery};

const THUMBNAIL_SIZE: Pixels = px(56.);
const PREVIEW_SIZE: Pixels = px(96.);
const FORM_WIDTH: Pixels = px(520.);

/// First screen: pick a display name and one of the generated avatars.
pub struct ProfileSetupView {
    name_input: Entity<InputState>,
    draft: ProfileDraft,
}

impl EventEmitter<ProfileConfirmed> for ProfileSetupView {}

impl ProfileSetupView {
    pub fn new(avatar_style: &str, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let name_input = cx.new(|cx| InputState::new(window, cx).placeholder("Enter your name"));

        cx.subscribe_in(
            &name_input,
            window,
            |this, _, event: &InputEvent, _window, cx| {
                this.draft
                    .set_name(this.name_input.read(cx).value().to_string());

                if let InputEvent::PressEnter { .. } = event {
                    this.save_profile(cx);
                }
            },
        )
        .detach();

        Self {
            name_input,
            draft: ProfileDraft::new(avatar_gallery(avatar_style)),
        }
    }

    fn select_avatar(&mut self, index: usize, cx: &mut Context<Self>) {
        if self.draft.select_avatar(index) {
            cx.notify();
        }
    }

    fn save_profile(&mut self, cx: &mut Context<Self>) {
        match self.draft.confirm() {
            Ok(profile) => {
                tracing::info!(name = %profile.name, "profile saved");
                cx.emit(ProfileConfirmed { profile });
            }
            Err(rejection) => {
                tracing::warn!(?rejection, "name or avatar cannot be empty");
            }
        }
    }

    fn render_gallery(&self, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let selected = self.draft.selected_index();

        h_flex()
            .id("avatar-gallery")
            .w_full()
            .flex_wrap()
            .justify_center()
            .gap_2()
            .children(self.draft.gallery().iter().enumerate().map(|(index, avatar)| {
                let is_selected = selected == Some(index);

                div()
                    .id(("avatar-option", index))
                    .size(THUMBNAIL_SIZE)
                    .p_1()
                    .rounded_full()
                    .border_2()
                    .border_color(if is_selected {
                        theme.primary
                    } else {
                        theme.border
                    })
                    .cursor_pointer()
                    .hover(|el| el.bg(theme.muted))
                    .child(
                        img(avatar.url.clone())
                            .size_full()
                            .rounded_full(),
                    )
                    .on_click(cx.listener(move |this, _event: &ClickEvent, _window, cx| {
                        this.select_avatar(index, cx);
                    }))
            }))
            .into_any_element()
    }
}

impl Render for ProfileSetupView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let preview = self.draft.selected_avatar().map(|avatar| avatar.url.clone());
        let gallery = self.render_gallery(cx);
        let theme = cx.theme();

        v_flex()
            .id("profile-setup")
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                v_flex()
                    .w(FORM_WIDTH)
                    .gap_4()
                    .p_6()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .items_center()
                    .child(
                        Label::new("Set up your profile")
                            .text_lg()
                            .font_weight(FontWeight::SEMIBOLD),
                    )
                    .child(Input::new(&self.name_input).w_full())
                    .child(gallery)
                    .child(
                        div()
                            .id("profile-pic-preview")
                            .size(PREVIEW_SIZE)
                            .rounded_full()
                            .border_1()
                            .border_color(theme.border)
                            .bg(theme.muted)
                            .when_some(preview, |el, url| {
                                el.border_2()
                                    .border_color(theme.primary)
                                    .child(img(url).size_full().rounded_full())
                            }),
                    )
                    .child(
                        Button::new("save-profile")
                            .primary()
                            .small()
                            .child("Save Profile")
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.save_profile(cx);
                            })),
                    ),
            )
    }
}
