//! Instruction blocks sent ahead of the user's prompt.

use codereel_core::types::Engine;

use crate::validate::{SCENE_CLASS_NAME, SKETCH_SIGNATURE};

/// Render parameters the instructions mention.
#[derive(Debug, Clone, Copy)]
pub struct PromptParams {
    pub width: u32,
    pub height: u32,
    pub duration_secs: u32,
    pub fps: u32,
}

/// The system instructions for `engine`.
pub fn system_prompt(engine: Engine, params: &PromptParams) -> String {
    match engine {
        Engine::P5 => format!(
            "You write p5.js sketches in global mode that are recorded to video.\n\
             Rules:\n\
             - Reply with JavaScript only. The reply must start with `{SKETCH_SIGNATURE}`.\n\
             - Call createCanvas({w}, {h}) in setup().\n\
             - Animate in draw() using frameCount; the recording captures {frames} frames \
               ({secs} seconds at {fps} fps) by calling redraw() manually.\n\
             - Do not load external files, fonts, images or sounds.\n\
             - Do not use noLoop(), loop(), frameRate(), millis() or user input.",
            w = params.width,
            h = params.height,
            frames = params.duration_secs * params.fps,
            secs = params.duration_secs,
            fps = params.fps,
        ),
        Engine::Manim => format!(
            "You write Manim Community Edition scenes that are rendered to video.\n\
             Rules:\n\
             - Reply with Python only, starting with `from manim import *`.\n\
             - Define exactly one scene: `{SCENE_CLASS_NAME}(Scene)` with a construct(self) method.\n\
             - Prefer Text over Tex and MathTex.\n\
             - Use Create, not ShowCreation. Use Axes.plot, not get_graph. Never use GraphScene.\n\
             - Do not use CONFIG dictionaries, manimlib, ImageMobject, SVGMobject or sounds.\n\
             - Keep the total animation around {secs} seconds.",
            secs = params.duration_secs,
        ),
    }
}
