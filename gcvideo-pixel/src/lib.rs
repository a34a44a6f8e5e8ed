//! Pixel shader constant tracking for GameCube GX emulation.
//!
//! The [`PixelShaderManager`] watches fixed-function register writes, caches
//! the values the generated pixel shader needs, and pushes only the changed
//! constants through a [`ConstantSink`] once per draw call.

pub mod bp;
pub mod config;
pub mod constants;
pub mod error;
pub mod pixel_shader_manager;

pub use bp::BpMemory;
pub use config::PixelConstantsConfig;
pub use constants::{ColorBank, ConstantSink, ConstantSlot, ShadowConstantBuffer};
pub use error::PixelConstantsError;
pub use pixel_shader_manager::PixelShaderManager;
