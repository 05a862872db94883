use gpui::*;
use gpui_component::notification::NotificationList;
use gpui_component::{Root, ThemeRegistry};

use chirp::app::{ChatAppShell, Quit, default_themes_path};
use chirp::settings::SettingsStore;

/// Bootstraps assets, components, theme watching, settings, and the main window.
fn main() {
    tracing_subscriber::fmt::init();

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(|cx| {
        gpui_tokio_bridge::init(cx);

        // Must run before any Root is created.
        gpui_component::init(cx);

        let settings_store = SettingsStore::load();
        match settings_store.ensure_template() {
            Ok(true) => tracing::info!(
                path = %settings_store.config_path().display(),
                "wrote settings template"
            ),
            Ok(false) => {}
            Err(err) => tracing::warn!("Failed to write settings template: {}", err),
        }
        let settings = settings_store.settings();

        let watched_store = settings_store.clone();
        if let Err(err) = ThemeRegistry::watch_dir(default_themes_path(), cx, move |cx| {
            watched_store.reload().apply_theme(None, cx);
            tracing::info!("Theme directory watch initialized");
        }) {
            tracing::warn!(
                "Failed to watch themes directory: {}. Using default themes.",
                err
            );
            settings.apply_theme(None, cx);
        }

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        let channel = settings.create_channel_or_local();
        let avatar_style = settings.avatar_style.clone();

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(900.), px(700.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                cx.open_window(options, |window, cx| {
                    let notification_list = cx.new(|cx| NotificationList::new(window, cx));
                    let shell = cx.new(|cx| {
                        ChatAppShell::new(notification_list, channel, &avatar_style, window, cx)
                    });

                    cx.new(|cx| Root::new(shell, window, cx))
                })
                .expect("failed to open main window");

                cx.activate(true);
            })
        })
        .detach();
    });
}
