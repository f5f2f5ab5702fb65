use cathode8_mapper::nes::mapper::fme7::{FME7_MAPPER_ID, FME7_STATE_SIZE};
use cathode8_mapper::nes::{
    Bank, BankMap, Cartridge, Fme7, IrqState, Mapper, MapperRegistry, Mirroring,
    NTSC_FRAME_CYCLES, NesTime, WramWindow,
};

fn patterned_banks(total_size: usize, bank_size: usize) -> Vec<u8> {
    let mut data = vec![0u8; total_size];
    for (bank, chunk) in data.chunks_mut(bank_size).enumerate() {
        chunk.fill((bank as u8).wrapping_add(1));
    }
    data
}

fn select(cart: &mut Cartridge, time: NesTime, reg: u8, data: u8) {
    cart.write(time, 0x8000, reg);
    cart.write(time + 2, 0xA000, data);
}

#[test]
fn cpu_reads_follow_prg_registers() {
    let prg = patterned_banks(16 * 0x2000, 0x2000);
    let mut cart = Cartridge::new(FME7_MAPPER_ID, &MapperRegistry::default()).unwrap();

    select(&mut cart, 0, 0x09, 0x03);
    select(&mut cart, 10, 0x0A, 0x04);
    select(&mut cart, 20, 0x0B, 0x05);
    select(&mut cart, 30, 0x08, 0x06);

    let read = |addr: u16| {
        cart.banks()
            .prg_offset(addr, prg.len())
            .map(|offset| prg[offset])
    };
    assert_eq!(read(0x6000), Some(7));
    assert_eq!(read(0x8000), Some(4));
    assert_eq!(read(0xA000), Some(5));
    assert_eq!(read(0xC000), Some(6));
    assert_eq!(read(0xFFFF), Some(16));
}

#[test]
fn chr_reads_follow_chr_registers() {
    let chr = patterned_banks(32 * 0x0400, 0x0400);
    let mut cart = Cartridge::new(FME7_MAPPER_ID, &MapperRegistry::default()).unwrap();

    for slot in 0..8u8 {
        select(&mut cart, slot as NesTime * 10, slot, 31 - slot);
    }
    for slot in 0..8u16 {
        let offset = cart.banks().chr_offset(slot * 0x0400 + 0x10, chr.len());
        assert_eq!(chr[offset], 32 - slot as u8);
    }
}

#[test]
fn countdown_spanning_several_frames() {
    let mut cart = Cartridge::new(FME7_MAPPER_ID, &MapperRegistry::default()).unwrap();
    // 0xFFFF cycles is a little over two NTSC frames.
    select(&mut cart, 500, 0x0D, 0x01);
    let deadline = 502 + 0xFFFF;
    assert_eq!(cart.next_irq(502), Some(deadline));

    cart.end_frame(NTSC_FRAME_CYCLES);
    assert_eq!(cart.next_irq(0), Some(deadline - NTSC_FRAME_CYCLES));
    cart.end_frame(NTSC_FRAME_CYCLES);
    let remaining = deadline - 2 * NTSC_FRAME_CYCLES;
    assert_eq!(cart.next_irq(0), Some(remaining));

    cart.run_until(remaining - 1);
    assert_eq!(cart.next_irq(remaining - 1), Some(remaining));
    cart.run_until(remaining);
    assert_eq!(cart.next_irq(remaining + 3), Some(remaining + 3));

    // Still asserted after the frame ends, until software disables it.
    cart.end_frame(NTSC_FRAME_CYCLES);
    assert_eq!(cart.next_irq(0), Some(0));
    select(&mut cart, 100, 0x0D, 0x00);
    assert_eq!(cart.next_irq(102), None);
}

#[test]
fn save_state_taken_mid_countdown_resumes_identically() {
    let registry = MapperRegistry::default();
    let mut cart = Cartridge::new(FME7_MAPPER_ID, &registry).unwrap();
    select(&mut cart, 0, 0x0E, 0x00);
    select(&mut cart, 10, 0x0F, 0xF0);
    select(&mut cart, 20, 0x0D, 0x01);
    select(&mut cart, 30, 0x0C, 0x02);
    select(&mut cart, 40, 0x08, 0x80);
    cart.end_frame(NTSC_FRAME_CYCLES);

    let state = cart.save_state();
    let mut resumed = Cartridge::new(FME7_MAPPER_ID, &registry).unwrap();
    resumed.load_state(&state).unwrap();

    assert_eq!(resumed.banks(), cart.banks());
    assert_eq!(resumed.banks().mirroring(), Mirroring::OneScreenLower);
    assert_eq!(resumed.banks().wram(), WramWindow::Rom(Bank::Index(0)));
    for time in [0, 1000, 10_000] {
        cart.run_until(time);
        resumed.run_until(time);
        assert_eq!(resumed.next_irq(time), cart.next_irq(time));
    }
}

#[test]
fn state_block_is_host_order_independent() {
    let mut bus = BankMap::new();
    let mut mapper = Fme7::new();
    mapper.reset(&mut bus);
    mapper.write(&mut bus, 0, 0x8000, 0x0E);
    mapper.write(&mut bus, 0, 0xA000, 0xCD);
    mapper.write(&mut bus, 0, 0x8000, 0x0F);
    mapper.write(&mut bus, 0, 0xA000, 0xAB);
    mapper.write(&mut bus, 0, 0x8000, 0x0D);
    mapper.write(&mut bus, 0x0102, 0xA000, 0x01);

    let state = mapper.save_state();
    assert_eq!(state.len(), FME7_STATE_SIZE);
    assert_eq!(&state[15..17], &[0xCD, 0xAB]);
    assert_eq!(&state[17..21], &[0xCF, 0xAC, 0x00, 0x00]);

    let mut loaded = Fme7::new();
    loaded.load_state(&state).unwrap();
    assert_eq!(loaded.irq_state(), IrqState::Armed(0x0102 + 0xABCD));
}
