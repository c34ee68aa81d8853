#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod coach;
mod config;
mod controller;
mod link;
mod model_download;
mod pipeline;
mod protocol;
mod types;
mod ui;

use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded};
use gpui::Application;

use crate::{
    config::Config, controller::Controller, link::HeadsetLink, pipeline::start_pose_worker,
    types::overlay_channel,
};

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::from_env_or_default();
    let link = HeadsetLink::bind(&config.network).context("failed to open headset link")?;

    let (frame_tx, frame_rx) = bounded(1);
    let (pose_tx, pose_rx) = bounded(1);
    let (command_tx, command_rx) = unbounded();

    let _pose_worker = start_pose_worker(config.model.clone(), frame_rx, pose_tx);

    if !config.overlay.enabled {
        log::info!("overlay disabled, running headless");
        Controller::new(config, link, frame_tx, pose_rx, None, command_rx).run();
        return Ok(());
    }

    let (overlay_tx, overlay_rx) = overlay_channel(8);
    let title = config.overlay.title.clone();

    thread::Builder::new()
        .name("coach-controller".into())
        .spawn(move || {
            Controller::new(config, link, frame_tx, pose_rx, Some(overlay_tx), command_rx).run();
        })
        .context("failed to spawn controller thread")?;

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, overlay_rx, command_tx, title) {
                eprintln!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}
