use log::warn;
use serde::Serialize;

use super::mapper::Mirroring;

pub const PRG_WINDOW_SIZE: usize = 0x2000;
pub const CHR_WINDOW_SIZE: usize = 0x0400;

const PRG_ROM_BASE: usize = 0x8000;
const PRG_WINDOWS: usize = 4;
const CHR_WINDOWS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BankSize {
    Size1K,
    Size4K,
    Size8K,
    Size16K,
}

impl BankSize {
    pub const fn bytes(self) -> usize {
        match self {
            BankSize::Size1K => 0x0400,
            BankSize::Size4K => 0x1000,
            BankSize::Size8K => 0x2000,
            BankSize::Size16K => 0x4000,
        }
    }
}

/// Bank number as the mapper sees it. The bus owns the ROM, so only the bus
/// can turn `FromLast` into a concrete index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Bank {
    Index(usize),
    FromLast(usize),
}

impl Bank {
    pub const LAST: Bank = Bank::FromLast(0);

    /// Wraps out-of-range banks rather than rejecting them, like a ROM with
    /// unconnected upper address lines.
    pub fn resolve(self, bank_count: usize) -> usize {
        let count = bank_count.max(1);
        match self {
            Bank::Index(index) => index % count,
            Bank::FromLast(back) => count - 1 - (back % count),
        }
    }

    /// `part` of `parts` equally sized sub-banks of this bank.
    fn split(self, parts: usize, part: usize) -> Bank {
        match self {
            Bank::Index(index) => Bank::Index(index * parts + part),
            Bank::FromLast(back) => Bank::FromLast(back * parts + (parts - 1 - part)),
        }
    }
}

/// Everything a mapper is allowed to do to the rest of the console.
///
/// Mappers only ever push configuration through this; they never read it
/// back, so `apply_mapping` must be able to rebuild it from registers alone.
pub trait MapperBus {
    fn set_prg_bank(&mut self, addr: u16, size: BankSize, bank: Bank);
    fn set_chr_bank(&mut self, addr: u16, size: BankSize, bank: Bank);
    fn enable_sram(&mut self, enabled: bool);
    fn set_mirroring(&mut self, mirroring: Mirroring);

    fn mirror_vertical(&mut self) {
        self.set_mirroring(Mirroring::Vertical);
    }

    fn mirror_horizontal(&mut self) {
        self.set_mirroring(Mirroring::Horizontal);
    }

    fn mirror_single(&mut self, screen: u8) {
        self.set_mirroring(if screen & 1 == 0 {
            Mirroring::OneScreenLower
        } else {
            Mirroring::OneScreenUpper
        });
    }

    /// The mapper's IRQ schedule may have moved; re-poll `next_irq`.
    fn irq_changed(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WramWindow {
    Ram { enabled: bool },
    Rom(Bank),
}

/// Bus-visible mapping state: what the CPU and PPU windows currently point at.
///
/// Two maps compare equal when every window and the mirroring agree; the
/// `irq_changed` tally is bookkeeping and is ignored.
#[derive(Debug, Clone, Serialize)]
pub struct BankMap {
    wram: WramWindow,
    prg: [Bank; PRG_WINDOWS],
    chr: [Bank; CHR_WINDOWS],
    mirroring: Mirroring,
    #[serde(skip)]
    irq_changes: u64,
}

impl Default for BankMap {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for BankMap {
    fn eq(&self, other: &Self) -> bool {
        self.wram == other.wram
            && self.prg == other.prg
            && self.chr == other.chr
            && self.mirroring == other.mirroring
    }
}

impl Eq for BankMap {}

impl BankMap {
    pub fn new() -> Self {
        Self {
            wram: WramWindow::Ram { enabled: false },
            prg: [Bank::Index(0); PRG_WINDOWS],
            chr: [Bank::Index(0); CHR_WINDOWS],
            mirroring: Mirroring::Vertical,
            irq_changes: 0,
        }
    }

    pub fn wram(&self) -> WramWindow {
        self.wram
    }

    /// Bank behind a $8000-$FFFF address.
    pub fn prg_bank(&self, addr: u16) -> Option<Bank> {
        let addr = addr as usize;
        (addr >= PRG_ROM_BASE).then(|| self.prg[(addr - PRG_ROM_BASE) / PRG_WINDOW_SIZE])
    }

    pub fn chr_bank(&self, addr: u16) -> Bank {
        self.chr[(addr as usize & 0x1FFF) / CHR_WINDOW_SIZE]
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn irq_changes(&self) -> u64 {
        self.irq_changes
    }

    /// PRG ROM offset for a CPU address, or `None` when the address is RAM or
    /// outside the cartridge windows.
    pub fn prg_offset(&self, addr: u16, prg_rom_len: usize) -> Option<usize> {
        let bank_count = prg_rom_len / PRG_WINDOW_SIZE;
        let offset = addr as usize % PRG_WINDOW_SIZE;
        let bank = match addr as usize {
            0x6000..=0x7FFF => match self.wram {
                WramWindow::Rom(bank) => bank,
                WramWindow::Ram { .. } => return None,
            },
            _ => self.prg_bank(addr)?,
        };
        Some(bank.resolve(bank_count) * PRG_WINDOW_SIZE + offset)
    }

    pub fn chr_offset(&self, addr: u16, chr_len: usize) -> usize {
        let bank_count = chr_len / CHR_WINDOW_SIZE;
        let offset = addr as usize % CHR_WINDOW_SIZE;
        self.chr_bank(addr).resolve(bank_count) * CHR_WINDOW_SIZE + offset
    }
}

impl MapperBus for BankMap {
    fn set_prg_bank(&mut self, addr: u16, size: BankSize, bank: Bank) {
        if size.bytes() < PRG_WINDOW_SIZE {
            warn!("PRG bank size {size:?} is finer than the 8 KiB windows, ignored");
            return;
        }
        let parts = size.bytes() / PRG_WINDOW_SIZE;
        for part in 0..parts {
            let window = addr as usize + part * PRG_WINDOW_SIZE;
            let sub_bank = bank.split(parts, part);
            match window {
                0x6000..=0x7FFF => self.wram = WramWindow::Rom(sub_bank),
                0x8000..=0xFFFF => self.prg[(window - PRG_ROM_BASE) / PRG_WINDOW_SIZE] = sub_bank,
                _ => warn!("PRG mapping at ${window:04X} is outside the cartridge, ignored"),
            }
        }
    }

    fn set_chr_bank(&mut self, addr: u16, size: BankSize, bank: Bank) {
        let parts = size.bytes() / CHR_WINDOW_SIZE;
        for part in 0..parts {
            let window = addr as usize + part * CHR_WINDOW_SIZE;
            if window >= CHR_WINDOW_SIZE * CHR_WINDOWS {
                warn!("CHR mapping at ${window:04X} is outside pattern memory, ignored");
                continue;
            }
            self.chr[window / CHR_WINDOW_SIZE] = bank.split(parts, part);
        }
    }

    fn enable_sram(&mut self, enabled: bool) {
        self.wram = WramWindow::Ram { enabled };
    }

    fn set_mirroring(&mut self, mirroring: Mirroring) {
        self.mirroring = mirroring;
    }

    fn irq_changed(&mut self) {
        self.irq_changes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_wraps_and_counts_from_the_end() {
        assert_eq!(Bank::Index(5).resolve(4), 1);
        assert_eq!(Bank::LAST.resolve(16), 15);
        assert_eq!(Bank::FromLast(1).resolve(16), 14);
        assert_eq!(Bank::Index(3).resolve(0), 0);
    }

    #[test]
    fn eight_k_mapping_fills_one_window() {
        let mut map = BankMap::new();
        map.set_prg_bank(0xA000, BankSize::Size8K, Bank::Index(7));
        assert_eq!(map.prg_bank(0xA123), Some(Bank::Index(7)));
        assert_eq!(map.prg_bank(0x8000), Some(Bank::Index(0)));
        assert_eq!(map.prg_bank(0x7FFF), None);
    }

    #[test]
    fn larger_mappings_split_into_consecutive_windows() {
        let mut map = BankMap::new();
        map.set_prg_bank(0xC000, BankSize::Size16K, Bank::LAST);
        assert_eq!(map.prg_bank(0xC000), Some(Bank::FromLast(1)));
        assert_eq!(map.prg_bank(0xE000), Some(Bank::FromLast(0)));

        map.set_chr_bank(0x1000, BankSize::Size4K, Bank::Index(2));
        assert_eq!(map.chr_bank(0x1000), Bank::Index(8));
        assert_eq!(map.chr_bank(0x1FFF), Bank::Index(11));
    }

    #[test]
    fn wram_window_switches_between_ram_and_rom() {
        let mut map = BankMap::new();
        map.enable_sram(true);
        assert_eq!(map.wram(), WramWindow::Ram { enabled: true });
        assert_eq!(map.prg_offset(0x6000, 0x10000), None);

        map.set_prg_bank(0x6000, BankSize::Size8K, Bank::Index(3));
        assert_eq!(map.wram(), WramWindow::Rom(Bank::Index(3)));
        assert_eq!(map.prg_offset(0x6010, 0x10000), Some(3 * 0x2000 + 0x10));
    }

    #[test]
    fn out_of_range_mappings_are_ignored() {
        let mut map = BankMap::new();
        let before = map.clone();
        map.set_prg_bank(0x4000, BankSize::Size8K, Bank::Index(1));
        map.set_chr_bank(0x2000, BankSize::Size1K, Bank::Index(1));
        map.set_prg_bank(0x8000, BankSize::Size1K, Bank::Index(1));
        assert_eq!(map, before);
    }

    #[test]
    fn offsets_resolve_against_rom_size() {
        let mut map = BankMap::new();
        map.set_prg_bank(0xE000, BankSize::Size8K, Bank::LAST);
        assert_eq!(map.prg_offset(0xFFFC, 8 * 0x2000), Some(7 * 0x2000 + 0x1FFC));

        map.set_chr_bank(0x0400, BankSize::Size1K, Bank::Index(9));
        assert_eq!(map.chr_offset(0x0405, 8 * 0x0400), 0x0400 + 5);
    }

    #[test]
    fn mirroring_helpers_and_irq_tally() {
        let mut map = BankMap::new();
        map.mirror_single(1);
        assert_eq!(map.mirroring(), Mirroring::OneScreenUpper);
        map.mirror_single(0);
        assert_eq!(map.mirroring(), Mirroring::OneScreenLower);
        map.mirror_horizontal();
        assert_eq!(map.mirroring(), Mirroring::Horizontal);

        let quiet = map.clone();
        map.irq_changed();
        assert_eq!(map.irq_changes(), 1);
        assert_eq!(map, quiet);
    }
}
