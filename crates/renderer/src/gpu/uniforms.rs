use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use chrono::{Datelike, Local, Timelike};

use crate::mouse::MouseUniform;

/// CPU mirror of the `PreviewParams` std140 block in the GLSL header.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct PreviewUniforms {
    pub i_resolution: [f32; 3],
    pub i_time: f32,
    pub i_mouse: [f32; 4],
    pub i_date: [f32; 4],
    pub u_mouse: [f32; 2],
    pub i_time_delta: f32,
    pub i_frame: i32,
    pub blur_radius: f32,
    pub _padding: [f32; 3],
}

impl PreviewUniforms {
    pub fn new(width: u32, height: u32, blur_radius: f32) -> Self {
        let mut uniforms = Self {
            i_resolution: [width as f32, height as f32, 1.0],
            i_time: 0.0,
            i_mouse: [0.0; 4],
            i_date: [0.0; 4],
            u_mouse: [0.0; 2],
            i_time_delta: 0.0,
            i_frame: 0,
            blur_radius,
            _padding: [0.0; 3],
        };
        uniforms.refresh_date();
        uniforms
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.i_resolution[0] = width as f32;
        self.i_resolution[1] = height as f32;
    }

    pub fn set_mouse(&mut self, mouse: MouseUniform) {
        self.i_mouse = mouse.i_mouse;
        self.u_mouse = mouse.cursor;
    }

    pub fn apply_tick(&mut self, tick: FrameTick) {
        self.i_time = tick.seconds;
        self.i_time_delta = tick.delta;
        self.i_frame = tick.frame;
        self.refresh_date();
    }

    fn refresh_date(&mut self) {
        let local_now = Local::now();
        let seconds_since_midnight = local_now.num_seconds_from_midnight() as f32
            + local_now.nanosecond() as f32 / 1_000_000_000.0;
        self.i_date = [
            local_now.year() as f32,
            local_now.month() as f32,
            local_now.day() as f32,
            seconds_since_midnight,
        ];
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrameTick {
    pub seconds: f32,
    pub delta: f32,
    pub frame: i32,
}

/// Wall-clock time since the first rendered frame.
#[derive(Debug)]
pub(crate) struct FrameClock {
    start: Option<Instant>,
    last: Option<Instant>,
    frames: u32,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: None,
            last: None,
            frames: 0,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn tick(&mut self, now: Instant) -> FrameTick {
        let start = *self.start.get_or_insert(now);
        let last = self.last.replace(now).unwrap_or(now);
        let frame = self.frames.min(i32::MAX as u32) as i32;
        self.frames = self.frames.saturating_add(1);

        FrameTick {
            seconds: now.saturating_duration_since(start).as_secs_f32(),
            delta: now.saturating_duration_since(last).as_secs_f32(),
            frame,
        }
    }
}
