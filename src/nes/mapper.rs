pub mod fme7;

use anyhow::Result;
use serde::Serialize;

use super::NesTime;
use super::banks::MapperBus;

pub use fme7::Fme7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    OneScreenLower,
    OneScreenUpper,
}

/// A cartridge mapper chip.
///
/// Mappers own their registers and nothing else; every visible effect is
/// pushed into the [`MapperBus`] passed alongside the call. Times are CPU
/// cycles relative to the start of the current frame.
pub trait Mapper {
    fn name(&self) -> &'static str;

    /// Power-on/reset register values, then a full `apply_mapping`.
    fn reset(&mut self, bus: &mut dyn MapperBus);

    /// CPU write into the cartridge's register space.
    fn write(&mut self, bus: &mut dyn MapperBus, time: NesTime, addr: u16, data: u8);

    /// Re-asserts every register's effect on the bus. Calling this alone must
    /// rebuild the same mapping the write history produced.
    fn apply_mapping(&self, bus: &mut dyn MapperBus);

    fn run_until(&mut self, _end_time: NesTime) {}

    fn end_frame(&mut self, end_time: NesTime) {
        self.run_until(end_time);
    }

    /// When the mapper will next assert IRQ, `present` if it already is.
    fn next_irq(&self, _present: NesTime) -> Option<NesTime> {
        None
    }

    /// The IRQ output line. It lives outside the register block, so a
    /// container that wants it to survive a save state carries it itself.
    fn irq_pending(&self) -> bool {
        false
    }

    fn set_irq_pending(&mut self, _pending: bool) {}

    fn save_state(&self) -> Vec<u8>;

    /// Replaces the registers only; call `apply_mapping` afterwards or use
    /// [`Mapper::restore_state`].
    fn load_state(&mut self, state: &[u8]) -> Result<()>;

    fn restore_state(&mut self, bus: &mut dyn MapperBus, state: &[u8]) -> Result<()> {
        self.load_state(state)?;
        self.apply_mapping(bus);
        Ok(())
    }

    fn debug_state(&self) -> String {
        String::new()
    }
}
