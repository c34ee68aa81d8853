use gpui::{
    AnyElement, Context, InteractiveElement, IntoElement, ParentElement, Styled, Window,
    WindowControlArea, div, px,
};
use gpui_component::{ActiveTheme, h_flex};

use super::AppView;
use crate::types::CoachStatus;

impl AppView {
    pub(super) fn render_titlebar(
        &self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let (icon, status_color) = match self.status {
            CoachStatus::Standby => ("○", theme.muted_foreground),
            CoachStatus::Workout { .. } => ("●", theme.success),
        };

        h_flex()
            .window_control_area(WindowControlArea::Drag)
            .h(px(32.0))
            .w_full()
            .items_center()
            .justify_between()
            .bg(gpui::rgb(0x1a2332))
            .child(
                h_flex()
                    .gap_3()
                    .pl(px(80.0))
                    .pr_3()
                    .h_full()
                    .items_center()
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xc9d1d9))
                            .child(self.title.clone()),
                    )
                    .child(
                        div()
                            .px_2()
                            .py_0p5()
                            .rounded_md()
                            .bg(gpui::rgba(0x00000033))
                            .text_xs()
                            .text_color(status_color)
                            .child(format!("{icon} {}", self.status.label())),
                    ),
            )
            .child(window_controls(window))
            .into_any_element()
    }
}

#[cfg(target_os = "macos")]
fn window_controls(_window: &mut Window) -> AnyElement {
    // native traffic lights
    div().into_any_element()
}

#[cfg(not(target_os = "macos"))]
fn window_controls(window: &mut Window) -> AnyElement {
    let maximize_icon = if window.is_maximized() { "❐" } else { "□" };

    h_flex()
        .gap_1()
        .px_2()
        .child(control_button("window-minimize", WindowControlArea::Min, "—", 0x1f2428))
        .child(control_button(
            "window-maximize",
            WindowControlArea::Max,
            maximize_icon,
            0x1f2428,
        ))
        .child(control_button("window-close", WindowControlArea::Close, "✕", 0xe81123))
        .into_any_element()
}

#[cfg(not(target_os = "macos"))]
fn control_button(
    id: &'static str,
    area: WindowControlArea,
    icon: &'static str,
    hover: u32,
) -> impl IntoElement {
    div()
        .id(id)
        .size(px(28.0))
        .flex()
        .items_center()
        .justify_center()
        .rounded_md()
        .cursor_pointer()
        .occlude()
        .text_sm()
        .text_color(gpui::rgb(0xc9d1d9))
        .window_control_area(area)
        .hover(move |s| s.bg(gpui::rgb(hover)))
        .child(icon)
}
