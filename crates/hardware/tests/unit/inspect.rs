//! Cache State Accessor Tests.

use pretty_assertions::assert_eq;
use rvtrial_core::inspect::{AccessError, CacheAccessor, CacheInspectable, CacheLevel};

use crate::common::builder::instruction::{InstructionBuilder, exit_sequence};
use crate::common::harness::{TestContext, test_config};

fn ran_store() -> TestContext {
    let mut program = vec![
        InstructionBuilder::new().lui(5, 0x80).build(),
        InstructionBuilder::new().sd(5, 5, 0).build(),
    ];
    program.extend(exit_sequence(0));
    let mut ctx = TestContext::new().load_program(0x1000, &program);
    let _ = ctx.run(100);
    ctx
}

#[test]
fn accessor_resolves_each_level() {
    let ctx = TestContext::new();
    for level in CacheLevel::ALL {
        assert_eq!(CacheAccessor::cache(ctx.cpu(), level).level(), level);
        assert_eq!(CacheLevel::from_id(level.id()), Some(level));
    }
    assert_eq!(CacheLevel::from_id(3), None);
    assert_eq!(CacheLevel::L1D.to_string(), "L1D");
}

#[test]
fn disabled_level_is_not_attached() {
    let mut config = test_config();
    config.cache.l2.enabled = false;
    let mut ctx = TestContext::with_config(config);

    assert_eq!(
        CacheAccessor::attached(ctx.cpu()),
        vec![CacheLevel::L1I, CacheLevel::L1D]
    );
    assert_eq!(
        CacheAccessor::read_state(ctx.cpu(), CacheLevel::L2),
        Err(AccessError::NotAttached(CacheLevel::L2))
    );
    assert!(CacheAccessor::reset_all(ctx.cpu_mut()).is_ok());
}

#[test]
fn writeback_then_reset_through_accessor() {
    let mut ctx = ran_store();
    let cpu = ctx.cpu_mut();

    assert_eq!(CacheAccessor::writeback(cpu, CacheLevel::L1D), Ok(1));
    let lines = CacheAccessor::read_state(cpu, CacheLevel::L1D).unwrap();
    assert!(lines.iter().any(|l| l.valid && l.tag == 0x10 && !l.metadata.dirty));

    CacheAccessor::reset_all(cpu).unwrap();
    for level in CacheLevel::ALL {
        assert!(CacheAccessor::valid_set(cpu, level).unwrap().iter().all(|v| !v));
    }
}

/// Inspecting a cache costs no simulated time and changes no counters.
#[test]
fn inspection_is_out_of_band() {
    let ctx = ran_store();
    let stats = ctx.cpu().stats.clone();
    for level in CacheLevel::ALL {
        let _ = CacheAccessor::read_state(ctx.cpu(), level).unwrap();
    }
    assert_eq!(ctx.cpu().stats, stats);
}
