// SPDX-License-Identifier: CEPL-1.0
//! Swapchain invalidation handling.
//!
//! `Running` → (resize / out-of-date) → `Rebuilding` → `Running`, with a
//! detour through `Suspended` for as long as the window has no area. A
//! rebuild is all-or-nothing: drain the GPU, destroy the whole generation,
//! build the next one.

use crate::context::GraphicsContext;
use crate::device::DeviceOps;
use crate::error::{GfxError, Result};
use crate::generation::DynamicGeneration;
use crate::swapchain::SwapchainBundle;
use bitflags::bitflags;
use boturi_render::{RenderSize, WindowEvents};
use tracing::{debug, info};

bitflags! {
    /// Why the current generation has to be replaced.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RebuildReason: u8 {
        const INITIAL = 1 << 0;
        const RESIZED = 1 << 1;
        const OUT_OF_DATE = 1 << 2;
        const SUBOPTIMAL = 1 << 3;
    }
}

/// Recoverable results of acquire/present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    /// Zero-sized window; nothing is recreated until it has area again.
    Suspended,
    Rebuilding,
}

pub struct ResizeCoordinator {
    state: LifecycleState,
    pending: RebuildReason,
    generation: Option<DynamicGeneration>,
    generations_built: u64,
}

impl ResizeCoordinator {
    /// Builds the first generation, or suspends if the window starts empty.
    pub fn start<D: DeviceOps>(ctx: &GraphicsContext<D>, extent: RenderSize) -> Result<Self> {
        let mut coordinator = ResizeCoordinator {
            state: LifecycleState::Rebuilding,
            pending: RebuildReason::INITIAL,
            generation: None,
            generations_built: 0,
        };
        coordinator.pump(ctx, extent)?;
        Ok(coordinator)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn pending(&self) -> RebuildReason {
        self.pending
    }

    /// The live generation. `None` only before the first non-zero extent.
    pub fn generation(&self) -> Option<&DynamicGeneration> {
        self.generation.as_ref()
    }

    /// Completed builds, the startup one included.
    pub fn generations_built(&self) -> u64 {
        self.generations_built
    }

    /// Frames may be recorded against the current generation.
    pub fn is_ready(&self) -> bool {
        self.state == LifecycleState::Running
            && self.pending.is_empty()
            && self.generation.is_some()
    }

    pub fn request_rebuild(&mut self, reason: RebuildReason) {
        self.pending |= reason;
        if self.state == LifecycleState::Running {
            self.state = LifecycleState::Rebuilding;
        }
    }

    pub fn report_present(&mut self, outcome: PresentOutcome) {
        match outcome {
            PresentOutcome::Presented => {}
            PresentOutcome::Suboptimal => self.request_rebuild(RebuildReason::SUBOPTIMAL),
            PresentOutcome::OutOfDate => self.request_rebuild(RebuildReason::OUT_OF_DATE),
        }
    }

    /// Services any pending rebuild without blocking.
    ///
    /// Returns `Suspended` while `window_extent` (or the surface) is empty;
    /// the caller should wait for the next window event and pump again.
    pub fn pump<D: DeviceOps>(
        &mut self,
        ctx: &GraphicsContext<D>,
        window_extent: RenderSize,
    ) -> Result<LifecycleState> {
        if self.generation.is_none() {
            self.pending |= RebuildReason::INITIAL;
        }
        if self.pending.is_empty() {
            self.state = LifecycleState::Running;
            return Ok(self.state);
        }

        if window_extent.is_zero() {
            return Ok(self.suspend(window_extent));
        }

        self.state = LifecycleState::Rebuilding;
        debug!(reason = ?self.pending, "rebuilding swapchain resources");

        // Destroying anything a queued command buffer still references is UB.
        ctx.wait_idle()?;

        // Queried after the drain: the window may have been minimized meanwhile.
        let surface = SwapchainBundle::resolve_extent(ctx, window_extent)?;
        if surface.width == 0 || surface.height == 0 {
            return Ok(self.suspend(RenderSize::new(surface.width, surface.height)));
        }

        let built = match self.generation.take() {
            Some(generation) => generation.rebuild(ctx, window_extent),
            None => DynamicGeneration::create(ctx, window_extent),
        };
        let next = match built {
            Ok(next) => next,
            Err(GfxError::ZeroExtent) => {
                // The old generation is already gone; start over once there is area.
                self.pending |= RebuildReason::INITIAL;
                return Ok(self.suspend(RenderSize::new(0, 0)));
            }
            Err(e) => return Err(e),
        };
        let extent = next.extent();
        self.generation = Some(next);
        self.generations_built += 1;
        self.pending = RebuildReason::empty();
        self.state = LifecycleState::Running;
        info!(
            "generation {} live at {}x{}",
            self.generations_built, extent.width, extent.height
        );
        Ok(self.state)
    }

    fn suspend(&mut self, extent: RenderSize) -> LifecycleState {
        if self.state != LifecycleState::Suspended {
            info!(
                "surface is {}x{}, suspending until it has area",
                extent.width, extent.height
            );
        }
        self.state = LifecycleState::Suspended;
        self.state
    }

    /// Services any pending rebuild, blocking on window events while suspended.
    pub fn refresh_blocking<D: DeviceOps, W: WindowEvents>(
        &mut self,
        ctx: &GraphicsContext<D>,
        window: &mut W,
    ) -> Result<()> {
        while self.pump(ctx, window.framebuffer_size())? == LifecycleState::Suspended {
            window.wait_events();
        }
        Ok(())
    }

    /// Final teardown, valid from any state.
    pub fn shutdown<D: DeviceOps>(self, ctx: &GraphicsContext<D>) -> Result<()> {
        ctx.wait_idle()?;
        if let Some(generation) = self.generation {
            generation.destroy(ctx)?;
        }
        info!("swapchain resources released");
        Ok(())
    }
}
