use crate::types::NUM_POSE_LANDMARKS;

/// MediaPipe pose topology over the 33 body landmarks.
pub const POSE_CONNECTIONS: &[(usize, usize)] = &[
    // face
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    // arms and hands
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    // torso
    (11, 23),
    (12, 24),
    (23, 24),
    // legs
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

pub const SKELETON_LINE_THICKNESS: i32 = 3;
const JOINT_RADIUS: i32 = 4;

const BONE_COLOR: [u8; 4] = [245, 245, 245, 255];
const JOINT_COLOR: [u8; 4] = [239, 68, 68, 255];

/// Draws bones and joints for pixel-space `points` onto an RGBA buffer.
/// `None` joints are hidden together with every bone touching them.
pub fn draw_skeleton(buffer: &mut [u8], width: u32, height: u32, points: &[Option<(f32, f32)>]) {
    if points.len() < NUM_POSE_LANDMARKS {
        return;
    }

    for &(a, b) in POSE_CONNECTIONS {
        let (Some(from), Some(to)) = (points[a], points[b]) else {
            continue;
        };
        draw_line(
            buffer,
            width,
            height,
            from,
            to,
            BONE_COLOR,
            SKELETON_LINE_THICKNESS,
        );
    }

    for &(x, y) in points[..NUM_POSE_LANDMARKS].iter().flatten() {
        draw_circle(
            buffer,
            width,
            height,
            (x as i32, y as i32),
            JOINT_RADIUS,
            JOINT_COLOR,
        );
    }
}

fn draw_line(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    from: (f32, f32),
    to: (f32, f32),
    color: [u8; 4],
    thickness: i32,
) {
    // Bresenham, stamping a diamond of `thickness` at every step.
    let (mut x, mut y) = (from.0 as i32, from.1 as i32);
    let (x1, y1) = (to.0 as i32, to.1 as i32);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let step_x = if x < x1 { 1 } else { -1 };
    let step_y = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        for ox in -radius..=radius {
            for oy in -radius..=radius {
                if ox.abs() + oy.abs() <= radius {
                    put_pixel(buffer, width, height, x + ox, y + oy, color);
                }
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += step_x;
        }
        if e2 <= dx {
            err += dx;
            y += step_y;
        }
    }
}

fn draw_circle(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    (cx, cy): (i32, i32),
    radius: i32,
    color: [u8; 4],
) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel(buffer, width, height, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
        return;
    }
    let idx = (y as usize * width as usize + x as usize) * 4;
    if let Some(px) = buffer.get_mut(idx..idx + 4) {
        px.copy_from_slice(&color);
    }
}
