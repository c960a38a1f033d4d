use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tapemodem_core::{
    open_link, OutputState, PhaseState, SampleCache, Symbol, ToneConfig, TransferQueue, Variant,
    QUEUE_CAPACITY, SLOT_SAMPLES,
};

type Block = [i16; 8];

fn random_block(rng: &mut StdRng) -> Block {
    let mut block = [0i16; 8];
    rng.fill(&mut block[..]);
    block
}

fn random_symbol(rng: &mut StdRng) -> Symbol {
    Symbol::from_index(rng.gen_range(0..Symbol::COUNT)).expect("Index in range")
}

#[test]
fn test_fifo_order_up_to_capacity() {
    let mut rng = StdRng::seed_from_u64(16);
    for n in 0..=QUEUE_CAPACITY {
        let (mut producer, mut consumer) = TransferQueue::<Block>::new();
        let blocks: Vec<Block> = (0..n).map(|_| random_block(&mut rng)).collect();

        for block in &blocks {
            producer.enqueue(*block).expect("Enqueue within capacity");
        }

        let mut observed = Vec::new();
        while let Some(block) = consumer.peek_next() {
            observed.push(block);
            consumer.advance_read();
        }
        assert_eq!(observed, blocks, "FIFO order broken for n={}", n);
    }
}

#[test]
fn test_drained_iff_counts_match() {
    let mut rng = StdRng::seed_from_u64(42);
    let (mut producer, mut consumer) = TransferQueue::<u16>::new();
    let mut enqueued = 0usize;
    let mut advanced = 0usize;

    for step in 0..2000u16 {
        let outstanding = enqueued - advanced;
        let push = outstanding == 0 || (outstanding < QUEUE_CAPACITY && rng.gen_bool(0.5));
        if push {
            producer.enqueue(step).expect("Queue has room");
            enqueued += 1;
        } else {
            consumer.advance_read();
            advanced += 1;
        }
        assert_eq!(producer.is_drained(), enqueued == advanced);
        assert_eq!(consumer.is_drained(), enqueued == advanced);
        assert_eq!(producer.len(), enqueued - advanced);
    }
}

#[test]
fn test_two_bytes_then_empty() {
    let (mut tx, mut scheduler) = open_link(ToneConfig::default()).expect("Failed to open link");
    tx.try_send(b'C').expect("Queue has room");
    tx.try_send(b'D').expect("Queue has room");

    assert_eq!(scheduler.next_state(), OutputState::Draining(Symbol::Byte(b'C')));
    scheduler.tick();
    assert_eq!(scheduler.next_state(), OutputState::Draining(Symbol::Byte(b'D')));
    scheduler.tick();

    assert_eq!(scheduler.next_state(), OutputState::Silent);
    assert!(tx.is_drained());
}

#[test]
fn test_phase_is_fold_over_continuity() {
    let cache = SampleCache::new(ToneConfig::default()).expect("Failed to build cache");
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for _ in 0..20 {
        let symbols: Vec<Symbol> = (0..200).map(|_| random_symbol(&mut rng)).collect();
        let mut phase = PhaseState::new();
        let mut folded = false;

        for &symbol in &symbols {
            let sample = cache.get(symbol);
            let expected = if folded { Variant::B } else { Variant::A };
            assert_eq!(cache.fetch(symbol, &mut phase), sample.variant(expected));
            folded ^= sample.continuity();
            assert_eq!(phase.last_sense(), folded);
        }
    }
}

#[test]
fn test_block_boundaries_continue_slope() {
    let cache = SampleCache::new(ToneConfig::default()).expect("Failed to build cache");
    let mut rng = StdRng::seed_from_u64(7);
    let mut phase = PhaseState::new();

    let mut previous: Option<Vec<i16>> = None;
    for _ in 0..5000 {
        let block = cache.fetch(random_symbol(&mut rng), &mut phase).to_vec();
        assert_eq!(block[0], 0, "Every block starts at zero");

        if let Some(prev) = previous.as_ref() {
            let last = prev[prev.len() - 1];
            let next = block[1];
            // a block ending above zero is followed by one heading below it, and vice versa
            if last != 0 && next != 0 {
                assert_eq!(last.signum(), -next.signum(), "Discontinuity at block boundary");
            }
        }
        previous = Some(block);
    }
}

#[test]
fn test_idle_alternates_every_slot() {
    let cache = SampleCache::new(ToneConfig::default()).expect("Failed to build cache");
    let idle = cache.get(Symbol::IdleCarrier).variant(Variant::A);
    let zero = cache.table().zero_tone();

    for (i, slot) in idle.chunks(SLOT_SAMPLES).enumerate() {
        let sign = if i % 2 == 0 { 1 } else { -1 };
        let expected: Vec<i16> = zero.iter().map(|&s| s * sign).collect();
        assert_eq!(slot, expected.as_slice(), "Slot {} has wrong polarity", i);
    }
}
