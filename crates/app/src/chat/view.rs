use std::sync::Arc;

use chirp_channel::{ChannelEvent, MessageChannel, MessageSubscription, SubscriptionWorker};
use gpui::*;
use gpui_component::{ActiveTheme, h_flex, v_flex};
use gpui_tokio_bridge::Tokio;

use crate::chat::events::Submit;
use crate::chat::message::{MessageLog, send_outgoing};
use crate::chat::{MessageInput, MessageList};
use crate::profile::LocalProfile;

/// Chat screen: live message list over one channel subscription plus the composer.
pub struct ChatView {
    channel: Arc<dyn MessageChannel>,
    profile: Option<LocalProfile>,
    log: MessageLog,
    message_list: Entity<MessageList>,
    message_input: Entity<MessageInput>,
    subscription_worker_task: Option<Task<Result<(), gpui_tokio_bridge::JoinError>>>,
    subscription_reader_task: Option<Task<()>>,
}

impl ChatView {
    /// Opens the channel subscription right away; rows render once a profile is activated.
    pub fn new(channel: Arc<dyn MessageChannel>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let message_list = cx.new(MessageList::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.handle_submit(event.clone(), cx);
        })
        .detach();

        let mut view = Self {
            channel,
            profile: None,
            log: MessageLog::new(),
            message_list,
            message_input,
            subscription_worker_task: None,
            subscription_reader_task: None,
        };
        view.open_subscription(cx);
        view
    }

    pub fn channel_id(&self) -> &str {
        self.channel.id()
    }

    /// Binds the confirmed profile used for sending and for sent/received alignment.
    pub fn activate(&mut self, profile: LocalProfile, cx: &mut Context<Self>) {
        let local_name = profile.name.clone();
        self.profile = Some(profile);

        self.message_list.update(cx, |list, cx| {
            list.set_local_name(local_name, cx);
            list.request_scroll_to_bottom(cx);
        });
        cx.notify();
    }

    fn open_subscription(&mut self, cx: &mut Context<Self>) {
        match self.channel.subscribe() {
            Ok(handle) => {
                tracing::info!(channel = self.channel.id(), "subscribed to message channel");
                self.spawn_subscription_worker(handle.worker, cx);
                self.spawn_subscription_reader(handle.subscription, cx);
            }
            Err(error) => {
                tracing::error!(channel = self.channel.id(), %error, "failed to subscribe to message channel");
            }
        }
    }

    fn spawn_subscription_worker(&mut self, worker: SubscriptionWorker, cx: &mut Context<Self>) {
        self.subscription_worker_task = Some(Tokio::spawn(cx, worker));
    }

    fn spawn_subscription_reader(
        &mut self,
        mut subscription: MessageSubscription,
        cx: &mut Context<Self>,
    ) {
        self.subscription_reader_task = Some(cx.spawn(async move |this, cx| {
            while let Some(event) = subscription.recv().await {
                let delivered = this.update(cx, |this, cx| {
                    this.handle_channel_event(event, cx);
                });

                if delivered.is_err() {
                    break;
                }
            }

            tracing::debug!(channel = subscription.channel_id(), "message subscription closed");
            let _ = this.update(cx, |this, _cx| {
                this.handle_subscription_closed();
            });
        }));
    }

    fn handle_channel_event(&mut self, event: ChannelEvent, cx: &mut Context<Self>) {
        match event {
            ChannelEvent::Appended(record) => {
                let Some(message) = self.log.accept(record) else {
                    tracing::debug!("discarding record without sender or message");
                    return;
                };

                self.message_list.update(cx, |list, cx| {
                    list.push_message(message, cx);
                });
            }
            ChannelEvent::Error(error) => {
                tracing::error!(channel = self.channel.id(), %error, "message subscription reported an error");
            }
        }
    }

    fn handle_subscription_closed(&mut self) {
        self.subscription_worker_task = None;
        self.subscription_reader_task = None;
    }

    fn handle_submit(&mut self, event: Submit, cx: &mut Context<Self>) {
        let Some(profile) = self.profile.as_ref() else {
            tracing::warn!("message submitted before a profile was confirmed");
            return;
        };

        let Some(append) = send_outgoing(self.channel.as_ref(), profile, &event.content) else {
            tracing::warn!("message is empty");
            return;
        };

        let channel_id = self.channel.id().to_string();
        Tokio::spawn(cx, async move {
            if let Err(error) = append.await {
                tracing::error!(channel = %channel_id, %error, "failed to send message");
            }
        })
        .detach();
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let count = self.log.len();

        v_flex()
            .id("chat-view")
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                h_flex()
                    .id("chat-view-header")
                    .h(px(40.))
                    .px_4()
                    .items_center()
                    .justify_between()
                    .border_b_1()
                    .border_color(theme.border)
                    .child(
                        div()
                            .text_sm()
                            .font_weight(FontWeight::MEDIUM)
                            .text_color(theme.foreground)
                            .child(
                                self.profile
                                    .as_ref()
                                    .map(|profile| profile.name.clone())
                                    .unwrap_or_default(),
                            ),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.foreground.opacity(0.6))
                            .child(format!("{count} messages")),
                    ),
            )
            .child(
                div()
                    .id("chat-view-message-list")
                    .flex_1()
                    .min_h_0()
                    .child(self.message_list.clone()),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .child(self.message_input.clone()),
            )
    }
}
