use std::sync::Arc;

use crossbeam_channel::Sender;
use gpui::{
    App, AppContext, Context, IntoElement, Render, RenderImage, SharedString, TitlebarOptions,
    Window, WindowDecorations, WindowOptions,
};
use gpui_component::Root;

use crate::types::{CoachStatus, HudState, OverlayCommand, OverlayReceiver};

mod main_view;
mod render_util;
mod titlebar;

const CAMERA_MIN_SIZE: (f32, f32) = (320.0, 240.0);
const CAMERA_MAX_SIZE: (f32, f32) = (1280.0, 720.0);
const DEFAULT_CAMERA_RATIO: f32 = 4.0 / 3.0;

pub fn launch_ui(
    app: &mut App,
    overlay_rx: OverlayReceiver,
    command_tx: Sender<OverlayCommand>,
    title: String,
) -> gpui::Result<()> {
    let title = SharedString::from(title);
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some(title.clone()),
            appears_transparent: true,
            traffic_light_position: None,
        }),
        window_decorations: Some(WindowDecorations::Client),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(overlay_rx, command_tx, title));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    title: SharedString,
    overlay_rx: OverlayReceiver,
    command_tx: Sender<OverlayCommand>,
    status: CoachStatus,
    hud: HudState,
    frame_size: Option<(u32, u32)>,
    latest_image: Option<Arc<RenderImage>>,
    stop_pending: bool,
}

impl AppView {
    fn new(
        overlay_rx: OverlayReceiver,
        command_tx: Sender<OverlayCommand>,
        title: SharedString,
    ) -> Self {
        Self {
            title,
            overlay_rx,
            command_tx,
            status: CoachStatus::Standby,
            hud: HudState::default(),
            frame_size: None,
            latest_image: None,
            stop_pending: false,
        }
    }

    fn request_stop(&mut self) {
        if self.stop_pending {
            return;
        }
        match self.command_tx.send(OverlayCommand::StopWorkout) {
            Ok(()) => self.stop_pending = true,
            Err(err) => log::warn!("controller is gone, cannot stop workout: {err}"),
        }
    }

    fn apply_status(&mut self, status: CoachStatus) {
        if status == CoachStatus::Standby {
            // keep the last frame on screen but drop the workout HUD
            self.hud = HudState::default();
        }
        self.stop_pending = false;
        self.status = status;
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.drain_updates(window, cx);
        self.render_main(window, cx)
    }
}
