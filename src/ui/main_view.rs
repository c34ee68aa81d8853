use std::sync::Arc;

use gpui::{
    AnyElement, Context, Hsla, IntoElement, ObjectFit, ParentElement, RenderImage, SharedString,
    Styled, StyledImage, Window, div, img, px,
};
use gpui_component::{
    StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use super::{
    AppView, CAMERA_MAX_SIZE, CAMERA_MIN_SIZE, DEFAULT_CAMERA_RATIO, render_util::frame_to_image,
};
use crate::{
    coach::script,
    types::{Banner, CoachStatus, HudState, Tone},
};

fn tone_color(tone: Tone) -> Hsla {
    match tone {
        Tone::Neutral => gpui::rgb(0xffffff).into(),
        Tone::Progress => gpui::rgb(0xfacc15).into(),
        Tone::Alert => gpui::rgb(0xef4444).into(),
    }
}

impl AppView {
    pub(super) fn drain_updates(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        // Only the newest frame is rasterized; older ones would be replaced immediately.
        if let Some(overlay) = self.overlay_rx.frame_rx.try_iter().last() {
            if let Some(image) = frame_to_image(&overlay.frame, overlay.landmarks.as_deref()) {
                self.replace_latest_image(image, window, cx);
            }
            self.frame_size = Some((overlay.frame.width, overlay.frame.height));
            // a frame queued before the return to standby must not bring the HUD back
            if matches!(self.status, CoachStatus::Workout { .. }) {
                self.hud = overlay.hud;
            }
        }

        while let Ok(status) = self.overlay_rx.status_rx.try_recv() {
            self.apply_status(status);
        }
    }

    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let viewport = window.viewport_size();
        let ratio = self.camera_aspect_ratio();
        let camera_width = (f32::from(viewport.width) - 32.0)
            .min((f32::from(viewport.height) - 120.0) * ratio)
            .clamp(CAMERA_MIN_SIZE.0, CAMERA_MAX_SIZE.0);
        let camera_height = (camera_width / ratio).clamp(CAMERA_MIN_SIZE.1, CAMERA_MAX_SIZE.1);

        let frame_view: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .rounded_lg()
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child(match self.status {
                    CoachStatus::Standby => "VR 시작 신호를 기다리는 중...",
                    CoachStatus::Workout { .. } => "카메라 준비 중...",
                })
                .into_any_element()
        };

        let mut camera_shell = div()
            .relative()
            .w(px(camera_width))
            .h(px(camera_height))
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .child(frame_view)
            .child(render_hud(&self.hud));

        if let Some(banner) = self.hud.banner.as_ref().filter(|b| b.large) {
            camera_shell = camera_shell.child(render_countdown(banner));
        }

        let mut footer = h_flex().w(px(camera_width)).justify_between().items_center().child(
            div()
                .text_xs()
                .text_color(gpui::rgb(0xa0aab8))
                .child(self.frame_status()),
        );

        if matches!(self.status, CoachStatus::Workout { .. }) {
            let label = if self.stop_pending {
                "종료 중..."
            } else {
                "운동 종료"
            };
            footer = footer.child(
                Button::new(SharedString::from("stop-workout"))
                    .outline()
                    .label(label)
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.request_stop();
                        cx.notify();
                    })),
            );
        }

        let titlebar = self.render_titlebar(window, cx);

        v_flex()
            .size_full()
            .bg(gpui::rgb(0x1a2332))
            .child(titlebar)
            .child(
                v_flex()
                    .flex_1()
                    .gap_3()
                    .p_4()
                    .items_center()
                    .child(camera_shell)
                    .child(footer),
            )
            .into_any_element()
    }

    fn frame_status(&self) -> String {
        match self.frame_size {
            Some((w, h)) => format!("카메라 {w}x{h}"),
            None => "카메라 대기 중".to_string(),
        }
    }

    fn camera_aspect_ratio(&self) -> f32 {
        match self.frame_size {
            Some((w, h)) if h > 0 => w as f32 / h as f32,
            _ => DEFAULT_CAMERA_RATIO,
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
            // every frame and memory will climb rapidly while the camera is running.
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn render_hud(hud: &HudState) -> AnyElement {
    let mut column = v_flex()
        .absolute()
        .top(px(16.0))
        .left(px(20.0))
        .gap_2();

    if let Some(banner) = hud.banner.as_ref().filter(|b| !b.large) {
        column = column.child(
            div()
                .text_xl()
                .font_semibold()
                .text_color(tone_color(banner.tone))
                .child(banner.text.clone()),
        );
    }

    if let Some(count) = hud.count {
        column = column.child(
            div()
                .text_lg()
                .font_semibold()
                .text_color(gpui::rgb(0x22c55e))
                .child(format!("Count: {count}")),
        );
    }

    if let Some(debug) = &hud.debug {
        let color = if debug.back_ok {
            gpui::rgb(0x22c55e)
        } else {
            gpui::rgb(0xef4444)
        };
        column = column.child(div().text_sm().text_color(color).child(debug.text()));
    }

    for line in &hud.coach_lines {
        column = column.child(
            div()
                .text_lg()
                .text_color(gpui::rgb(0xffffff))
                .child(line.clone()),
        );
    }

    if let Some(remaining) = hud.hold_remaining {
        column = column.child(
            div()
                .text_lg()
                .font_semibold()
                .text_color(tone_color(Tone::Progress))
                .child(script::hold_remaining(remaining as f64)),
        );
    }

    column.into_any_element()
}

fn render_countdown(banner: &Banner) -> AnyElement {
    div()
        .absolute()
        .top_0()
        .left_0()
        .size_full()
        .flex()
        .items_center()
        .justify_center()
        .child(
            div()
                .text_size(px(96.0))
                .font_semibold()
                .text_color(tone_color(banner.tone))
                .child(banner.text.clone()),
        )
        .into_any_element()
}
