//! The contract a GPU backend fulfils, and the session gluing it to the
//! preprocessor.
//!
//! The sandbox core never talks to a graphics API directly. A backend
//! implements [`RenderDriver`] (program creation, uniform upload, resize,
//! draw) and [`Session`] orchestrates the rest: it owns the design-time and
//! runtime registries, the active [`Shader`], the [`Clock`], and the
//! before/after render [`Hooks`]. Every fault is routed into one
//! user-supplied error callback; when anything faults, no frame is rendered
//! and the session keeps its previous state.

use std::time::Instant;

use tracing::{debug, warn};

use preprocessor::{
    ModuleOptions, ModuleRegistry, Parser, RuntimeRegistry, SandboxError, Shader, UniformValue,
};

use crate::clock::{Clock, ClockState};
use crate::hooks::Hooks;

/// Full-screen clip-space triangle pair for WebGL 1 shaders.
pub const VERTEX_GL1: &str = r"attribute vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// The same vertex stage for WebGL 2 shaders.
pub const VERTEX_GL2: &str = r"#version 300 es

in vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// What the sandbox requires from a GPU backend.
pub trait RenderDriver {
    /// Compiles and links the program the session will draw with.
    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<(), SandboxError>;

    /// Pushes one uniform value. Unknown names are ignored; GPU compilers
    /// routinely optimise unused uniforms away.
    fn upload_uniform(&mut self, name: &str, value: &UniformValue);

    fn resize(&mut self, width: u32, height: u32);

    /// Renders one frame at the given clock state.
    fn draw(&mut self, state: &ClockState) -> Result<(), SandboxError>;
}

/// Recording backend for tests and offline runs.
#[derive(Debug, Default)]
pub struct HeadlessDriver {
    pub programs: Vec<(String, String)>,
    pub uploads: Vec<(String, UniformValue)>,
    pub sizes: Vec<(u32, u32)>,
    pub draws: usize,
    /// Forces `create_program` to fail, for exercising fault routing.
    pub fail_link: bool,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent value uploaded under `name`.
    pub fn last_upload(&self, name: &str) -> Option<&UniformValue> {
        self.uploads
            .iter()
            .rev()
            .find(|(uploaded, _)| uploaded == name)
            .map(|(_, value)| value)
    }
}

impl RenderDriver for HeadlessDriver {
    fn create_program(&mut self, vertex: &str, fragment: &str) -> Result<(), SandboxError> {
        if self.fail_link {
            return Err(SandboxError::ProgramLink("forced link failure".into()));
        }
        self.programs.push((vertex.to_string(), fragment.to_string()));
        Ok(())
    }

    fn upload_uniform(&mut self, name: &str, value: &UniformValue) {
        self.uploads.push((name.to_string(), value.clone()));
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.sizes.push((width, height));
    }

    fn draw(&mut self, _state: &ClockState) -> Result<(), SandboxError> {
        self.draws += 1;
        Ok(())
    }
}

type ErrorFn = Box<dyn FnMut(&SandboxError)>;

/// One shader sandbox: registries, active shader, clock, and hooks.
pub struct Session {
    design: ModuleRegistry,
    runtime: RuntimeRegistry,
    shader: Option<Shader>,
    vertex_override: Option<String>,
    clock: Clock,
    before_render: Hooks,
    after_render: Hooks,
    resolution: [f32; 2],
    seed: Option<u64>,
    error_callback: Option<ErrorFn>,
}

impl Session {
    /// A session over the bundled module library.
    pub fn new() -> Result<Self, SandboxError> {
        Ok(Self::with_registry(ModuleRegistry::with_builtins()?))
    }

    /// A session over a caller-provided design-time registry.
    pub fn with_registry(design: ModuleRegistry) -> Self {
        Self {
            design,
            runtime: RuntimeRegistry::new(),
            shader: None,
            vertex_override: None,
            clock: Clock::new(),
            before_render: Hooks::new(),
            after_render: Hooks::new(),
            resolution: [1.0, 1.0],
            seed: None,
            error_callback: None,
        }
    }

    /// Fixes the namespace seed so repeated loads produce identical output.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    /// Replaces the built-in vertex stage. The override must target the same
    /// GLSL profile as the fragment shader it is paired with.
    pub fn set_vertex_source(&mut self, source: impl Into<String>) {
        self.vertex_override = Some(source.into());
    }

    /// Routes every fault into `callback`.
    pub fn on_error(&mut self, callback: impl FnMut(&SandboxError) + 'static) {
        self.error_callback = Some(Box::new(callback));
    }

    pub fn define_module(
        &mut self,
        name: &str,
        source: impl Into<String>,
        options: ModuleOptions,
    ) -> Result<(), SandboxError> {
        self.design.define(name, source, options)
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.design
    }

    pub fn runtime(&self) -> &RuntimeRegistry {
        &self.runtime
    }

    pub fn shader(&self) -> Option<&Shader> {
        self.shader.as_ref()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn before_render(&mut self) -> &mut Hooks {
        &mut self.before_render
    }

    pub fn after_render(&mut self) -> &mut Hooks {
        &mut self.after_render
    }

    /// Compiles `source`, links it through the driver, and swaps it in. On
    /// any fault the error callback fires and the previous shader, program,
    /// and runtime registry stay untouched.
    pub fn load(&mut self, source: &str, driver: &mut dyn RenderDriver) -> bool {
        match self.try_load(source, driver) {
            Ok(()) => true,
            Err(err) => {
                self.report(&err);
                false
            }
        }
    }

    fn try_load(&mut self, source: &str, driver: &mut dyn RenderDriver) -> Result<(), SandboxError> {
        let mut runtime = RuntimeRegistry::new();
        let mut shader = match self.seed {
            Some(seed) => Shader::with_seed(source, seed),
            None => Shader::new(source),
        };
        let fragment = shader.compile(&self.design, &mut runtime)?.to_string();

        let fragment_version = shader.version();
        let vertex = match &self.vertex_override {
            Some(custom) => custom.clone(),
            None => match fragment_version {
                preprocessor::GlslVersion::Gl1 => VERTEX_GL1.to_string(),
                preprocessor::GlslVersion::Gl2 => VERTEX_GL2.to_string(),
            },
        };
        let vertex_version = Parser::new(vertex.as_str()).version();
        if vertex_version != fragment_version {
            return Err(SandboxError::VersionMismatch {
                vertex: vertex_version,
                fragment: fragment_version,
            });
        }

        driver.create_program(&vertex, &fragment)?;

        // The swap happens only after the driver accepted the program, so a
        // failed load leaves the running session untouched.
        self.shader = Some(shader);
        self.runtime = runtime;
        debug!(
            modules = self.runtime.len(),
            ?fragment_version,
            "loaded shader"
        );

        self.upload_option_defaults(driver);
        driver.upload_uniform(
            "u_resolution",
            &UniformValue::Vector(vec![f64::from(self.resolution[0]), f64::from(self.resolution[1])]),
        );
        Ok(())
    }

    fn upload_option_defaults(&self, driver: &mut dyn RenderDriver) {
        for (_, set) in self.runtime.all_options() {
            for option in set.values() {
                if let Some(default) = &option.default {
                    driver.upload_uniform(&option.uniform, default);
                }
            }
        }
    }

    /// Writes a user-level option through the runtime registry's mapping.
    /// Returns `false` when the key or option is unknown.
    pub fn set_option(
        &mut self,
        key: &str,
        option: &str,
        value: UniformValue,
        driver: &mut dyn RenderDriver,
    ) -> bool {
        let Some(set) = self.runtime.resolve_options(key) else {
            warn!(key, "no options registered under key");
            return false;
        };
        let Some(entry) = set.get(option) else {
            warn!(key, option, "unknown option");
            return false;
        };
        driver.upload_uniform(&entry.uniform, &value);
        true
    }

    pub fn resize(&mut self, width: u32, height: u32, driver: &mut dyn RenderDriver) {
        self.resolution = [width as f32, height as f32];
        driver.resize(width, height);
        driver.upload_uniform(
            "u_resolution",
            &UniformValue::Vector(vec![f64::from(width), f64::from(height)]),
        );
    }

    pub fn set_mouse(&mut self, x: f32, y: f32, driver: &mut dyn RenderDriver) {
        driver.upload_uniform(
            "u_mouse",
            &UniformValue::Vector(vec![f64::from(x), f64::from(y)]),
        );
    }

    /// Starts the clock; `now` comes from the host's monotonic source.
    pub fn play(&mut self, now: Instant) {
        self.clock.start(now, |_| {});
    }

    pub fn pause(&mut self) {
        self.clock.stop();
    }

    /// One scheduled frame. Skipped when the clock is paused or gated.
    pub fn frame(&mut self, now: Instant, driver: &mut dyn RenderDriver) -> bool {
        if !self.clock.frame(now) {
            return false;
        }
        let state = self.clock.state();
        self.render(&state, driver)
    }

    /// One deterministic manual step of `dt` seconds.
    pub fn step(&mut self, dt: f64, driver: &mut dyn RenderDriver) -> bool {
        self.clock.tick(dt);
        let state = self.clock.state();
        self.render(&state, driver)
    }

    fn render(&mut self, state: &ClockState, driver: &mut dyn RenderDriver) -> bool {
        if self.shader.is_none() {
            return false;
        }

        if let Err(err) = self.before_render.run(state) {
            self.report(&err);
            return false;
        }

        driver.upload_uniform("u_time", &UniformValue::Number(state.time));
        driver.upload_uniform("u_delta", &UniformValue::Number(state.delta));
        driver.upload_uniform("u_frame", &UniformValue::Number(state.frame as f64));

        if let Err(err) = driver.draw(state) {
            self.report(&err);
            return false;
        }

        if let Err(err) = self.after_render.run(state) {
            self.report(&err);
            return false;
        }
        true
    }

    fn report(&mut self, err: &SandboxError) {
        warn!(code = %err.code(), error = %err, "sandbox fault");
        if let Some(callback) = self.error_callback.as_mut() {
            callback(err);
        }
    }
}
