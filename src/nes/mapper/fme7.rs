//! Sunsoft FME-7 (iNES mapper 69).
//!
//! $8000-$9FFF latches a register number, $A000-$BFFF writes the selected
//! register. $C000-$FFFF belongs to the Sunsoft 5B audio port on boards that
//! carry it and is not emulated here.

use anyhow::{Result, bail};
use log::trace;

use super::{Mapper, Mirroring};
use crate::nes::NesTime;
use crate::nes::banks::{Bank, BankSize, MapperBus};
use crate::nes::irq::{IrqState, IrqTimer};
use crate::nes::state::{StateReader, StateWriter};

pub const FME7_MAPPER_ID: u16 = 69;

/// Persisted block: mirroring, 3 PRG banks, 8 CHR banks, command, IRQ
/// enable, WRAM control, IRQ count (le16), deadline (le32). The pending IRQ
/// line is not part of it.
pub const FME7_STATE_SIZE: usize = 1 + 3 + 8 + 1 + 1 + 1 + 2 + 4;
const _: () = assert!(FME7_STATE_SIZE == 21);

/// RAM mode at $6000 with the RAM chip-enable bit clear.
const WRAM_CONTROL_RESET: u8 = 0x40;

const WRAM_RAM_MODE: u8 = 0x40;
const WRAM_ENABLE: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fme7Registers {
    pub mirroring: u8,
    pub prg_banks: [u8; 3],
    pub chr_banks: [u8; 8],
    pub command: u8,
    pub wram_control: u8,
}

pub struct Fme7 {
    regs: Fme7Registers,
    timer: IrqTimer,
}

impl Default for Fme7 {
    fn default() -> Self {
        Self::new()
    }
}

/// Register $C: bit 1 selects one-screen (bit 0 picks the page), otherwise
/// bit 0 selects horizontal over vertical.
pub fn decode_mirroring(data: u8) -> Mirroring {
    if data & 0x02 != 0 {
        if data & 0x01 != 0 {
            Mirroring::OneScreenUpper
        } else {
            Mirroring::OneScreenLower
        }
    } else if data & 0x01 != 0 {
        Mirroring::Horizontal
    } else {
        Mirroring::Vertical
    }
}

fn map_prg_bank(bus: &mut dyn MapperBus, slot: usize, bank: u8) {
    let addr = 0x8000 + (slot as u16) * 0x2000;
    bus.set_prg_bank(addr, BankSize::Size8K, Bank::Index(bank as usize));
}

fn map_chr_bank(bus: &mut dyn MapperBus, slot: usize, bank: u8) {
    let addr = (slot as u16) * 0x0400;
    bus.set_chr_bank(addr, BankSize::Size1K, Bank::Index(bank as usize));
}

fn map_mirroring(bus: &mut dyn MapperBus, data: u8) {
    match decode_mirroring(data) {
        Mirroring::Vertical => bus.mirror_vertical(),
        Mirroring::Horizontal => bus.mirror_horizontal(),
        Mirroring::OneScreenLower => bus.mirror_single(0),
        Mirroring::OneScreenUpper => bus.mirror_single(1),
    }
}

fn map_wram_control(bus: &mut dyn MapperBus, data: u8) {
    if data & WRAM_RAM_MODE != 0 {
        bus.enable_sram(data & WRAM_ENABLE != 0);
    } else {
        bus.set_prg_bank(0x6000, BankSize::Size8K, Bank::Index((data & 0x3F) as usize));
    }
}

impl Fme7 {
    pub fn new() -> Self {
        Self {
            regs: Fme7Registers {
                wram_control: WRAM_CONTROL_RESET,
                ..Fme7Registers::default()
            },
            timer: IrqTimer::new(),
        }
    }

    pub fn registers(&self) -> &Fme7Registers {
        &self.regs
    }

    pub fn timer(&self) -> &IrqTimer {
        &self.timer
    }

    pub fn irq_state(&self) -> IrqState {
        self.timer.state()
    }

    fn write_register(&mut self, bus: &mut dyn MapperBus, time: NesTime, data: u8) {
        trace!("FME-7 ${:X} <- ${data:02X} at cycle {time}", self.regs.command);
        match self.regs.command {
            command @ 0x0..=0x7 => {
                let slot = command as usize;
                self.regs.chr_banks[slot] = data;
                map_chr_bank(bus, slot, data);
            }
            0x8 => {
                self.regs.wram_control = data;
                map_wram_control(bus, data);
            }
            command @ 0x9..=0xB => {
                let slot = (command - 0x9) as usize;
                self.regs.prg_banks[slot] = data;
                map_prg_bank(bus, slot, data);
            }
            0xC => {
                self.regs.mirroring = data;
                map_mirroring(bus, data);
            }
            command => {
                // Settle the counter up to this write before touching it.
                self.timer.run_until(time);
                match command {
                    0xD => self.timer.set_enabled(data & 0x01 != 0, time),
                    0xE => self.timer.set_count_low(data, time),
                    _ => self.timer.set_count_high(data, time),
                }
                bus.irq_changed();
            }
        }
    }
}

impl Mapper for Fme7 {
    fn name(&self) -> &'static str {
        "FME-7 / Sunsoft 5B"
    }

    fn reset(&mut self, bus: &mut dyn MapperBus) {
        *self = Self::new();
        self.apply_mapping(bus);
    }

    fn write(&mut self, bus: &mut dyn MapperBus, time: NesTime, addr: u16, data: u8) {
        match addr {
            0xC000..=0xFFFF => {}
            0xA000..=0xBFFF => self.write_register(bus, time, data),
            0x8000..=0x9FFF => self.regs.command = data & 0x0F,
            _ => {}
        }
    }

    fn apply_mapping(&self, bus: &mut dyn MapperBus) {
        // $E000 is hardwired to the last bank so the vectors stay reachable.
        bus.set_prg_bank(0xE000, BankSize::Size8K, Bank::LAST);
        for (slot, &bank) in self.regs.prg_banks.iter().enumerate() {
            map_prg_bank(bus, slot, bank);
        }
        for (slot, &bank) in self.regs.chr_banks.iter().enumerate() {
            map_chr_bank(bus, slot, bank);
        }
        map_mirroring(bus, self.regs.mirroring);
        map_wram_control(bus, self.regs.wram_control);
    }

    fn run_until(&mut self, end_time: NesTime) {
        self.timer.run_until(end_time);
    }

    fn end_frame(&mut self, end_time: NesTime) {
        self.timer.end_frame(end_time);
    }

    fn next_irq(&self, present: NesTime) -> Option<NesTime> {
        self.timer.next_irq(present)
    }

    fn save_state(&self) -> Vec<u8> {
        let regs = &self.regs;
        let timer = &self.timer;
        let mut out = StateWriter::with_capacity(FME7_STATE_SIZE);
        out.u8(regs.mirroring)
            .bytes(&regs.prg_banks)
            .bytes(&regs.chr_banks)
            .u8(regs.command)
            .bool(timer.enabled)
            .u8(regs.wram_control)
            .le16(timer.count)
            .le32(timer.next_time as u32);
        out.finish()
    }

    fn load_state(&mut self, state: &[u8]) -> Result<()> {
        if state.len() != FME7_STATE_SIZE {
            bail!(
                "FME-7 state block is {} bytes, expected {FME7_STATE_SIZE}",
                state.len()
            );
        }

        let mut input = StateReader::new(state);
        let mirroring = input.u8()?;
        let prg_banks = input.array::<3>()?;
        let chr_banks = input.array::<8>()?;
        let command = input.u8()? & 0x0F;
        let enabled = input.bool()?;
        let wram_control = input.u8()?;
        let count = input.le16()?;
        let next_time = input.le32()? as NesTime;
        input.finish()?;

        self.regs = Fme7Registers {
            mirroring,
            prg_banks,
            chr_banks,
            command,
            wram_control,
        };
        self.timer = IrqTimer {
            enabled,
            pending: false,
            count,
            next_time,
        };
        Ok(())
    }

    fn irq_pending(&self) -> bool {
        self.timer.pending()
    }

    fn set_irq_pending(&mut self, pending: bool) {
        self.timer.set_pending(pending);
    }

    fn debug_state(&self) -> String {
        let regs = &self.regs;
        format!(
            "FME7 cmd={:X} prg=[{:02X},{:02X},{:02X}] chr={:02X?} wram={:02X} mirror={:?} irq={:04X} {:?}",
            regs.command,
            regs.prg_banks[0],
            regs.prg_banks[1],
            regs.prg_banks[2],
            regs.chr_banks,
            regs.wram_control,
            decode_mirroring(regs.mirroring),
            self.timer.count(),
            self.timer.state()
        )
    }
}
