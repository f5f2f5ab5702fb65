use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;

use super::NesTime;
use super::banks::BankMap;
use super::mapper::fme7::FME7_MAPPER_ID;
use super::mapper::{Fme7, Mapper};
use super::state::{StateReader, StateWriter};

pub type MapperFactory = fn() -> Box<dyn Mapper>;

/// "MAPR", stored big-endian so it reads as text in a hex dump.
const STATE_MAGIC: u32 = 0x4D41_5052;
const STATE_VERSION: u8 = 2;
const STATE_HEADER_SIZE: usize = 4 + 1 + 2 + 1 + 2;

const FLAG_IRQ_PENDING: u8 = 0x01;

#[derive(Clone, Copy)]
struct MapperEntry {
    name: &'static str,
    factory: MapperFactory,
}

/// Mapper id to constructor table used when a cartridge is loaded.
pub struct MapperRegistry {
    entries: BTreeMap<u16, MapperEntry>,
}

fn new_fme7() -> Box<dyn Mapper> {
    Box::new(Fme7::new())
}

impl Default for MapperRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FME7_MAPPER_ID, "FME-7 / Sunsoft 5B", new_fme7);
        registry
    }
}

impl MapperRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn register(
        &mut self,
        mapper_id: u16,
        name: &'static str,
        factory: MapperFactory,
    ) -> &mut Self {
        if let Some(previous) = self.entries.insert(mapper_id, MapperEntry { name, factory }) {
            debug!(
                "mapper {mapper_id} re-registered: {} replaced by {name}",
                previous.name
            );
        }
        self
    }

    pub fn create(&self, mapper_id: u16) -> Result<Box<dyn Mapper>> {
        self.entries
            .get(&mapper_id)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| anyhow!("mapper {mapper_id} is not supported"))
    }

    pub fn name(&self, mapper_id: u16) -> &'static str {
        self.entries
            .get(&mapper_id)
            .map_or("Unsupported", |entry| entry.name)
    }

    pub fn ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.entries.keys().copied()
    }
}

/// A loaded cartridge: the mapper and the bank configuration it drives.
pub struct Cartridge {
    mapper_id: u16,
    mapper: Box<dyn Mapper>,
    banks: BankMap,
}

impl Cartridge {
    pub fn new(mapper_id: u16, registry: &MapperRegistry) -> Result<Self> {
        let mapper = registry
            .create(mapper_id)
            .with_context(|| format!("failed to build cartridge for mapper {mapper_id}"))?;
        let mut cart = Self {
            mapper_id,
            mapper,
            banks: BankMap::new(),
        };
        cart.reset();
        debug!("cartridge ready: mapper {mapper_id} ({})", cart.mapper.name());
        Ok(cart)
    }

    pub fn mapper_id(&self) -> u16 {
        self.mapper_id
    }

    pub fn mapper_name(&self) -> &'static str {
        self.mapper.name()
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }

    pub fn banks(&self) -> &BankMap {
        &self.banks
    }

    pub fn reset(&mut self) {
        self.mapper.reset(&mut self.banks);
    }

    pub fn write(&mut self, time: NesTime, addr: u16, data: u8) {
        self.mapper.write(&mut self.banks, time, addr, data);
    }

    pub fn run_until(&mut self, end_time: NesTime) {
        self.mapper.run_until(end_time);
    }

    pub fn end_frame(&mut self, end_time: NesTime) {
        self.mapper.end_frame(end_time);
    }

    pub fn next_irq(&self, present: NesTime) -> Option<NesTime> {
        self.mapper.next_irq(present)
    }

    /// Mapper block behind a header carrying magic, format version, mapper id,
    /// line flags and payload length.
    pub fn save_state(&self) -> Vec<u8> {
        let payload = self.mapper.save_state();
        let flags = if self.mapper.irq_pending() {
            FLAG_IRQ_PENDING
        } else {
            0
        };
        let mut out = StateWriter::with_capacity(STATE_HEADER_SIZE + payload.len());
        out.be32(STATE_MAGIC)
            .u8(STATE_VERSION)
            .le16(self.mapper_id)
            .u8(flags)
            .le16(payload.len() as u16)
            .bytes(&payload);
        out.finish()
    }

    pub fn load_state(&mut self, bytes: &[u8]) -> Result<()> {
        let mut input = StateReader::new(bytes);
        let magic = input.be32().context("save state header is truncated")?;
        if magic != STATE_MAGIC {
            bail!("not a mapper save state (magic ${magic:08X})");
        }
        let version = input.u8().context("save state header is truncated")?;
        if version != STATE_VERSION {
            bail!("unsupported save state version {version}, expected {STATE_VERSION}");
        }
        let mapper_id = input.le16().context("save state header is truncated")?;
        if mapper_id != self.mapper_id {
            bail!(
                "save state is for mapper {mapper_id}, cartridge uses mapper {}",
                self.mapper_id
            );
        }
        let flags = input.u8().context("save state header is truncated")?;
        if flags & !FLAG_IRQ_PENDING != 0 {
            bail!("unknown save state flags ${flags:02X}");
        }
        let len = input.le16().context("save state header is truncated")? as usize;
        let payload = input.rest();
        if payload.len() != len {
            bail!(
                "save state payload is {} bytes, header says {len}",
                payload.len()
            );
        }

        self.mapper
            .restore_state(&mut self.banks, payload)
            .with_context(|| format!("failed to restore {} state", self.mapper.name()))?;
        self.mapper.set_irq_pending(flags & FLAG_IRQ_PENDING != 0);
        Ok(())
    }
}
