//! Scripted in-memory driver and display for exercising the overlay without
//! hardware.
//!
//! [`FakeDriver`] and [`FakeDisplay`] are cheap handles over shared state:
//! clone one, hand the other to the backend, then script results and inspect
//! recorded calls through [`FakeDriver::state`] / [`FakeDisplay::state`].

use std::collections::{HashMap, VecDeque};
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::driver::{
    ColorKeyCaps, DisplayDriver, DisplayTarget, DriverCaps, HResult, LockFlags, LockedRegion,
    OverlayParams, SurfacePlacement, SurfaceRequest,
};
use crate::format::FourCc;
use crate::geometry::ScreenRect;

/// Role of a fake surface handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Front,
    Back,
}

#[derive(Debug)]
struct SurfaceInfo {
    width: u32,
    height: u32,
    fourcc: FourCc,
    back: Option<u32>,
    memory: Box<[u8]>,
    pitch: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateCall {
    pub surface: u32,
    pub src: ScreenRect,
    pub dst: ScreenRect,
    pub params: OverlayParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlitCall {
    pub surface: u32,
    pub src: ScreenRect,
    pub dst: ScreenRect,
    pub wait: bool,
}

/// Scripted results plus a log of every driver call.
#[derive(Debug)]
pub struct FakeState {
    /// Results for successive `create_surface` calls; empty means success.
    pub create_results: VecDeque<HResult>,
    /// Results for successive `lock` calls; empty means success.
    pub lock_results: VecDeque<HResult>,
    pub restore_result: Option<HResult>,
    pub caps: DriverCaps,
    pub caps_error: Option<HResult>,
    pub attach_error: Option<HResult>,
    pub update_error: Option<HResult>,
    pub flip_error: Option<HResult>,
    pub blit_error: Option<HResult>,
    /// FourCC reported by lock instead of the requested one.
    pub fourcc_override: Option<FourCc>,
    /// Report no FourCC at all from lock.
    pub omit_fourcc: bool,
    pub fourcc_codes: Vec<FourCc>,
    /// Row alignment in bytes used to derive pitches.
    pub pitch_alignment: usize,

    pub requests: Vec<SurfaceRequest>,
    pub locks: Vec<(u32, LockFlags)>,
    pub unlocks: Vec<u32>,
    pub restores: Vec<u32>,
    pub attach_calls: usize,
    pub caps_calls: usize,
    pub updates: Vec<UpdateCall>,
    pub flips: Vec<(u32, bool)>,
    pub blits: Vec<BlitCall>,
    /// Front surfaces whose handle was dropped.
    pub released: Vec<u32>,
    /// Back buffer handles dropped.
    pub back_handles_dropped: usize,

    surfaces: HashMap<u32, SurfaceInfo>,
    next_id: u32,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            create_results: VecDeque::new(),
            lock_results: VecDeque::new(),
            restore_result: None,
            caps: DriverCaps {
                color_key: ColorKeyCaps::DEST_OVERLAY,
            },
            caps_error: None,
            attach_error: None,
            update_error: None,
            flip_error: None,
            blit_error: None,
            fourcc_override: None,
            omit_fourcc: false,
            fourcc_codes: vec![FourCc::YV12, FourCc::YUY2],
            pitch_alignment: 64,
            requests: Vec::new(),
            locks: Vec::new(),
            unlocks: Vec::new(),
            restores: Vec::new(),
            attach_calls: 0,
            caps_calls: 0,
            updates: Vec::new(),
            flips: Vec::new(),
            blits: Vec::new(),
            released: Vec::new(),
            back_handles_dropped: 0,
            surfaces: HashMap::new(),
            next_id: 1,
        }
    }
}

impl FakeState {
    fn add_surface(&mut self, width: u32, height: u32, fourcc: FourCc) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let bytes_per_pixel = if fourcc.is_planar_420() { 1 } else { 2 };
        let align = self.pitch_alignment.max(1);
        let row = width as usize * bytes_per_pixel;
        let pitch = row.div_ceil(align) * align;
        let memory = vec![0u8; fourcc.image_len(pitch, height)].into_boxed_slice();

        self.surfaces.insert(
            id,
            SurfaceInfo {
                width,
                height,
                fourcc,
                back: None,
                memory,
                pitch,
            },
        );
        id
    }

    /// Bytes currently stored in a surface.
    pub fn surface_bytes(&self, id: u32) -> Option<&[u8]> {
        self.surfaces.get(&id).map(|s| &s.memory[..])
    }

    /// Pitch the fake hands out for a surface.
    pub fn surface_pitch(&self, id: u32) -> Option<usize> {
        self.surfaces.get(&id).map(|s| s.pitch)
    }

    /// Size a surface was created with.
    pub fn surface_size(&self, id: u32) -> Option<(u32, u32)> {
        self.surfaces.get(&id).map(|s| (s.width, s.height))
    }

    pub fn back_buffer_of(&self, front: u32) -> Option<u32> {
        self.surfaces.get(&front).and_then(|s| s.back)
    }
}

/// Owned handle to a fake surface. Dropping a front handle releases it.
#[derive(Debug)]
pub struct FakeSurface {
    id: u32,
    role: SurfaceRole,
    state: Arc<Mutex<FakeState>>,
}

impl FakeSurface {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn role(&self) -> SurfaceRole {
        self.role
    }
}

impl Drop for FakeSurface {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        match self.role {
            SurfaceRole::Front => state.released.push(self.id),
            SurfaceRole::Back => state.back_handles_dropped += 1,
        }
    }
}

/// Scripted display driver.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver without destination color-key support.
    pub fn without_color_key() -> Self {
        let driver = Self::new();
        driver.state().caps = DriverCaps::default();
        driver
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock()
    }

    pub fn script_locks(&self, results: impl IntoIterator<Item = HResult>) {
        self.state().lock_results.extend(results);
    }

    pub fn script_creates(&self, results: impl IntoIterator<Item = HResult>) {
        self.state().create_results.extend(results);
    }

    fn handle(&self, id: u32, role: SurfaceRole) -> FakeSurface {
        FakeSurface {
            id,
            role,
            state: Arc::clone(&self.state),
        }
    }
}

fn fail_if(code: Option<HResult>) -> Result<(), HResult> {
    match code {
        Some(code) => Err(code),
        None => Ok(()),
    }
}

// SAFETY: locked regions point into boxed slices owned by the shared state,
// sized `FourCc::image_len(pitch, height)`, which are never freed or resized while
// the state is alive.
unsafe impl DisplayDriver for FakeDriver {
    type Surface = FakeSurface;

    fn create_surface(&mut self, request: &SurfaceRequest) -> Result<FakeSurface, HResult> {
        let id = {
            let mut state = self.state();
            state.requests.push(*request);
            if let Some(code) = state.create_results.pop_front() {
                if !code.is_ok() {
                    return Err(code);
                }
            }

            let id = state.add_surface(request.width, request.height, request.fourcc);
            if let SurfacePlacement::FlippingOverlay { back_buffers } = request.placement {
                if back_buffers > 0 {
                    let back = state.add_surface(request.width, request.height, request.fourcc);
                    if let Some(front) = state.surfaces.get_mut(&id) {
                        front.back = Some(back);
                    }
                }
            }
            id
        };
        Ok(self.handle(id, SurfaceRole::Front))
    }

    fn caps(&mut self) -> Result<DriverCaps, HResult> {
        let mut state = self.state();
        state.caps_calls += 1;
        fail_if(state.caps_error)?;
        Ok(state.caps)
    }

    fn fourcc_codes(&mut self) -> Vec<FourCc> {
        self.state().fourcc_codes.clone()
    }

    fn lock(&mut self, surface: &FakeSurface, flags: LockFlags) -> Result<LockedRegion, HResult> {
        let mut state = self.state();
        state.locks.push((surface.id, flags));
        if let Some(code) = state.lock_results.pop_front() {
            if !code.is_ok() {
                return Err(code);
            }
        }

        let reported = if state.omit_fourcc {
            None
        } else {
            state.fourcc_override
        };
        let omit = state.omit_fourcc;
        let info = state
            .surfaces
            .get_mut(&surface.id)
            .ok_or(HResult::SURFACE_LOST)?;
        let base = NonNull::new(info.memory.as_mut_ptr()).ok_or(HResult::GENERIC)?;

        Ok(LockedRegion {
            base,
            pitch: info.pitch,
            fourcc: if omit {
                None
            } else {
                reported.or(Some(info.fourcc))
            },
        })
    }

    fn unlock(&mut self, surface: &FakeSurface) -> Result<(), HResult> {
        self.state().unlocks.push(surface.id);
        Ok(())
    }

    fn restore(&mut self, surface: &FakeSurface) -> Result<(), HResult> {
        let mut state = self.state();
        state.restores.push(surface.id);
        fail_if(state.restore_result)
    }

    fn attached_back_buffer(&mut self, surface: &FakeSurface) -> Result<FakeSurface, HResult> {
        let back = {
            let mut state = self.state();
            state.attach_calls += 1;
            fail_if(state.attach_error)?;
            state
                .back_buffer_of(surface.id)
                .ok_or(HResult::NOT_FOUND)?
        };
        Ok(self.handle(back, SurfaceRole::Back))
    }

    fn update_overlay(
        &mut self,
        surface: &FakeSurface,
        src: ScreenRect,
        dst: ScreenRect,
        params: &OverlayParams,
    ) -> Result<(), HResult> {
        let mut state = self.state();
        state.updates.push(UpdateCall {
            surface: surface.id,
            src,
            dst,
            params: *params,
        });
        fail_if(state.update_error)
    }

    fn flip(&mut self, surface: &FakeSurface, wait: bool) -> Result<(), HResult> {
        let mut state = self.state();
        state.flips.push((surface.id, wait));
        fail_if(state.flip_error)?;

        // Swap the memory of the front surface and its back buffer.
        let Some(back_id) = state.back_buffer_of(surface.id) else {
            return Ok(());
        };
        let front_mem = state
            .surfaces
            .get_mut(&surface.id)
            .map(|s| std::mem::take(&mut s.memory));
        if let (Some(front_mem), Some(back)) = (front_mem, state.surfaces.get_mut(&back_id)) {
            let back_mem = std::mem::replace(&mut back.memory, front_mem);
            if let Some(front) = state.surfaces.get_mut(&surface.id) {
                front.memory = back_mem;
            }
        }
        Ok(())
    }

    fn blit_to_primary(
        &mut self,
        surface: &FakeSurface,
        src: ScreenRect,
        dst: ScreenRect,
        wait: bool,
    ) -> Result<(), HResult> {
        let mut state = self.state();
        state.blits.push(BlitCall {
            surface: surface.id,
            src,
            dst,
            wait,
        });
        fail_if(state.blit_error)
    }
}

/// Recorded display activity.
#[derive(Debug, Default)]
pub struct DisplayLog {
    pub fills: Vec<(Option<ScreenRect>, u32)>,
    pub commits: usize,
    pub origin: (i32, i32),
    pub fill_error: Option<HResult>,
}

/// Scripted display target.
#[derive(Debug, Clone, Default)]
pub struct FakeDisplay {
    state: Arc<Mutex<DisplayLog>>,
}

impl FakeDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(x: i32, y: i32) -> Self {
        let display = Self::new();
        display.state().origin = (x, y);
        display
    }

    pub fn state(&self) -> MutexGuard<'_, DisplayLog> {
        self.state.lock()
    }
}

impl DisplayTarget for FakeDisplay {
    fn fill_rect(&mut self, rect: Option<ScreenRect>, color: u32) -> Result<(), HResult> {
        let mut state = self.state();
        state.fills.push((rect, color));
        fail_if(state.fill_error)
    }

    fn commit(&mut self) {
        self.state().commits += 1;
    }

    fn screen_origin(&self) -> (i32, i32) {
        self.state().origin
    }
}
