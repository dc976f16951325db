#![forbid(unsafe_code)]

//! Deterministic host simulator for testing.
//!
//! [`SimulatedHost`] stands in for the live process: it implements the
//! [`HookInstaller`] capability and the [`MemorySource`] read capability
//! over an in-memory image of the structures tickhook reads (the subject
//! struct and the phase pointer chain), and drives installed hooks with
//! the same call discipline the real interception points have:
//!
//! - [`step`](SimulatedHost::step) routes real input through the input
//!   filter, advances the host frame, then fires the sim-step post-hook.
//! - [`change_subject_state`](SimulatedHost::change_subject_state) applies
//!   the state write (the "original") and then notifies the state-change
//!   hook with the pre-read old state.
//!
//! Everything is synchronous and single-threaded, like the host contract.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tickhook_core::{EntityRef, InputFrame};

use crate::hooks::{Hook, HookError, HookInstaller, StateChange, symbols};
use crate::memory::{MemorySource, ReadError, subject};

/// Where the simulator maps the subject struct.
pub const SUBJECT_BASE: u64 = 0x7100_0000;
const SUBJECT_LEN: usize = 0x800;

/// Where the simulator maps the phase chain.
pub const PHASE_GLOBAL: u64 = 0x7200_0000;
const PHASE_MANAGER: u64 = 0x7210_0000;
const PHASE_INNER: u64 = 0x7220_0000;

#[derive(Debug, Default)]
struct MemImage {
    regions: BTreeMap<u64, Vec<u8>>,
}

impl MemImage {
    fn map(&mut self, base: u64, len: usize) {
        self.regions.insert(base, vec![0u8; len]);
    }

    fn unmap(&mut self, base: u64) {
        self.regions.remove(&base);
    }

    fn write(&mut self, addr: u64, data: &[u8]) {
        for (&base, region) in &mut self.regions {
            if addr >= base && (addr + data.len() as u64) <= base + region.len() as u64 {
                let off = (addr - base) as usize;
                region[off..off + data.len()].copy_from_slice(data);
                return;
            }
        }
    }

    fn read(&self, addr: u64, out: &mut [u8]) -> Result<(), ReadError> {
        for (&base, region) in &self.regions {
            if addr >= base && (addr + out.len() as u64) <= base + region.len() as u64 {
                let off = (addr - base) as usize;
                out.copy_from_slice(&region[off..off + out.len()]);
                return Ok(());
            }
        }
        Err(ReadError::Unmapped {
            addr,
            len: out.len(),
        })
    }
}

/// Cloneable read handle into the simulator's memory image.
#[derive(Debug, Clone)]
pub struct SimMemory(Rc<RefCell<MemImage>>);

impl MemorySource for SimMemory {
    fn read(&self, addr: u64, out: &mut [u8]) -> Result<(), ReadError> {
        self.0.borrow().read(addr, out)
    }
}

#[derive(Default)]
struct InstalledHooks {
    sim_step: Option<Box<dyn FnMut()>>,
    state_change: Option<Box<dyn FnMut(StateChange)>>,
    input_read: Option<Box<dyn FnMut(InputFrame) -> InputFrame>>,
}

/// A deterministic stand-in for the live host process.
pub struct SimulatedHost {
    memory: Rc<RefCell<MemImage>>,
    hooks: InstalledHooks,
    frame: u64,
}

impl SimulatedHost {
    /// A host with the subject mapped (state zero) and the phase chain
    /// linked, sitting in the editor phase.
    #[must_use]
    pub fn new() -> Self {
        let mut image = MemImage::default();
        image.map(SUBJECT_BASE, SUBJECT_LEN);
        image.map(PHASE_GLOBAL, 8);
        image.map(PHASE_MANAGER, 0x40);
        image.map(PHASE_INNER, 0x20);
        image.write(PHASE_GLOBAL, &PHASE_MANAGER.to_le_bytes());
        image.write(PHASE_MANAGER + 0x30, &PHASE_INNER.to_le_bytes());
        image.write(PHASE_INNER + 0x1C, &3i32.to_le_bytes());

        Self {
            memory: Rc::new(RefCell::new(image)),
            hooks: InstalledHooks::default(),
            frame: 0,
        }
    }

    /// A read capability over this host's memory, for building a session.
    #[must_use]
    pub fn memory(&self) -> Box<dyn MemorySource> {
        Box::new(SimMemory(Rc::clone(&self.memory)))
    }

    /// Resolved address of the phase manager global.
    #[must_use]
    pub const fn phase_global(&self) -> u64 {
        PHASE_GLOBAL
    }

    /// The subject's base reference.
    #[must_use]
    pub const fn subject(&self) -> EntityRef {
        EntityRef(SUBJECT_BASE)
    }

    /// Host frames stepped so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_phase(&mut self, phase: i32) {
        self.memory
            .borrow_mut()
            .write(PHASE_INNER + 0x1C, &phase.to_le_bytes());
    }

    /// Sever the phase pointer chain (null inner link), making phase reads
    /// fail transiently.
    pub fn unlink_phase_chain(&mut self) {
        self.memory
            .borrow_mut()
            .write(PHASE_MANAGER + 0x30, &0u64.to_le_bytes());
    }

    /// Relink the phase pointer chain.
    pub fn relink_phase_chain(&mut self) {
        self.memory
            .borrow_mut()
            .write(PHASE_MANAGER + 0x30, &PHASE_INNER.to_le_bytes());
    }

    /// Unmap the subject struct, as the host does when it destroys the
    /// subject. Reads through stale references fail from here on.
    pub fn destroy_subject(&mut self) {
        self.memory.borrow_mut().unmap(SUBJECT_BASE);
    }

    pub fn set_subject_pos(&mut self, x: f32, y: f32) {
        let mut image = self.memory.borrow_mut();
        image.write(SUBJECT_BASE + subject::POS_X.offset, &x.to_le_bytes());
        image.write(SUBJECT_BASE + subject::POS_Y.offset, &y.to_le_bytes());
    }

    pub fn set_subject_vel(&mut self, x: f32, y: f32) {
        let mut image = self.memory.borrow_mut();
        image.write(SUBJECT_BASE + subject::VEL_X.offset, &x.to_le_bytes());
        image.write(SUBJECT_BASE + subject::VEL_Y.offset, &y.to_le_bytes());
    }

    pub fn set_subject_variant(&mut self, variant: u32) {
        self.memory.borrow_mut().write(
            SUBJECT_BASE + subject::VARIANT_ID.offset,
            &variant.to_le_bytes(),
        );
    }

    pub fn set_subject_in_water(&mut self, in_water: bool) {
        self.memory
            .borrow_mut()
            .write(SUBJECT_BASE + subject::IN_WATER.offset, &[u8::from(in_water)]);
    }

    /// Apply a state change the way the host does: write the new state,
    /// reset the state age, then notify the wrapping hook with the old
    /// state read beforehand.
    pub fn change_subject_state(&mut self, new_state: u32) {
        let old_state = {
            let image = self.memory.borrow();
            let mut buf = [0u8; 4];
            let _ = image.read(SUBJECT_BASE + subject::CUR_STATE.offset, &mut buf);
            u32::from_le_bytes(buf)
        };
        {
            let mut image = self.memory.borrow_mut();
            image.write(SUBJECT_BASE + subject::CUR_STATE.offset, &new_state.to_le_bytes());
            image.write(SUBJECT_BASE + subject::STATE_AGE.offset, &0u32.to_le_bytes());
        }
        if let Some(hook) = self.hooks.state_change.as_mut() {
            hook(StateChange {
                entity: EntityRef(SUBJECT_BASE),
                old_state,
                new_state,
            });
        }
    }

    /// One host frame: poll input through the filter, advance the frame
    /// and the subject's state age, then fire the sim-step post-hook.
    /// Returns the input the host actually saw.
    pub fn step(&mut self, real: InputFrame) -> InputFrame {
        let seen = match self.hooks.input_read.as_mut() {
            Some(filter) => filter(real),
            None => real,
        };

        self.frame += 1;
        {
            let mut image = self.memory.borrow_mut();
            let mut buf = [0u8; 4];
            if image
                .read(SUBJECT_BASE + subject::STATE_AGE.offset, &mut buf)
                .is_ok()
            {
                let age = u32::from_le_bytes(buf).saturating_add(1);
                image.write(SUBJECT_BASE + subject::STATE_AGE.offset, &age.to_le_bytes());
            }
        }

        if let Some(hook) = self.hooks.sim_step.as_mut() {
            hook();
        }
        seen
    }

    /// Step `n` frames with neutral real input.
    pub fn run(&mut self, n: u64) {
        for _ in 0..n {
            self.step(InputFrame::NEUTRAL);
        }
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HookInstaller for SimulatedHost {
    fn install(&mut self, symbol: &str, hook: Hook) -> Result<(), HookError> {
        match (symbol, hook) {
            (symbols::SIM_STEP, Hook::SimStep(f)) => {
                if self.hooks.sim_step.is_some() {
                    return Err(HookError::AlreadyInstalled(symbol.into()));
                }
                self.hooks.sim_step = Some(f);
                Ok(())
            }
            (symbols::SUBJECT_CHANGE_STATE, Hook::StateChange(f)) => {
                if self.hooks.state_change.is_some() {
                    return Err(HookError::AlreadyInstalled(symbol.into()));
                }
                self.hooks.state_change = Some(f);
                Ok(())
            }
            (symbols::INPUT_READ, Hook::InputRead(f)) => {
                if self.hooks.input_read.is_some() {
                    return Err(HookError::AlreadyInstalled(symbol.into()));
                }
                self.hooks.input_read = Some(f);
                Ok(())
            }
            (symbols::SIM_STEP, _) => Err(HookError::KindMismatch {
                symbol: symbol.into(),
                expected: "SimStep",
            }),
            (symbols::SUBJECT_CHANGE_STATE, _) => Err(HookError::KindMismatch {
                symbol: symbol.into(),
                expected: "StateChange",
            }),
            (symbols::INPUT_READ, _) => Err(HookError::KindMismatch {
                symbol: symbol.into(),
                expected: "InputRead",
            }),
            (other, _) => Err(HookError::SymbolNotFound(other.into())),
        }
    }
}
