pub mod camera;
pub mod pose;
pub mod rgba_converter;
pub mod skeleton;

// Re-exports for convenience
pub use camera::open_first_camera;
pub use pose::start_pose_worker;
