pub mod banks;
pub mod cartridge;
pub mod endian;
pub mod irq;
pub mod mapper;
pub mod state;

/// CPU cycle count relative to the start of the current frame.
pub type NesTime = i32;

/// CPU cycles in one NTSC frame, rounded up.
pub const NTSC_FRAME_CYCLES: NesTime = 29_781;

pub use banks::{Bank, BankMap, BankSize, MapperBus, WramWindow};
pub use cartridge::{Cartridge, MapperRegistry};
pub use irq::{IrqState, IrqTimer};
pub use mapper::{Fme7, Mapper, Mirroring};
