use shovel_factory::core::event_log::{EventLog, MemoryEventLog, ProductionAction};
use shovel_factory::core::stats::ProductionStats;
use shovel_factory::factory::{Dealer, Workshop};
use shovel_factory::{
    BoundedBuffer, ComponentKind, FactoryConfig, FactoryError, FactorySimulation,
    IdAllocator, PoolState, Shovel, ShutdownSignal,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn fast_config() -> FactoryConfig {
    FactoryConfig::new()
        .with_buffer_capacities(20)
        .with_suppliers(2, 2)
        .with_assemblers(3)
        .with_dealers(4)
        .with_supply_intervals(2, 3)
        .with_assembly_delay(1)
        .with_restock_target(10)
        .with_shutdown_timeout(5_000)
}

/// Shovel id out of a line like `Dealer 3: Shovel 42 (Handle: 7, Blade: 9) sold`
fn shovel_id(line: &str) -> u64 {
    let after = line.split("Shovel ").nth(1).unwrap();
    after.split(' ').next().unwrap().parse().unwrap()
}

#[test]
fn test_factory_runs_and_shuts_down_cleanly() {
    let sink = Arc::new(MemoryEventLog::new());
    let mut factory = FactorySimulation::new(fast_config(), sink.clone()).unwrap();

    let snapshot = factory.run_for(Duration::from_millis(400)).unwrap();

    assert_eq!(factory.pool_state(), PoolState::Stopped);
    assert!(snapshot.handles_supplied > 0);
    assert!(snapshot.blades_supplied > 0);
    assert!(snapshot.assembled > 0, "assemblers made progress: {}", snapshot);
    assert!(snapshot.sold <= snapshot.shovels_built());
    assert_eq!(snapshot.dropped_log_lines, 0);

    let stock = factory.stock();
    assert!(stock.handles <= 20 && stock.blades <= 20 && stock.shovels <= 20);

    let lines = sink.lines();
    assert_eq!(sink.count_action(ProductionAction::Assembled) as u64, snapshot.assembled);
    assert_eq!(sink.count_action(ProductionAction::Sold) as u64, snapshot.sold);
    for line in &lines {
        assert!(
            line.starts_with("Assembler ") || line.starts_with("Dealer "),
            "unexpected line: {}",
            line
        );
    }

    // Every built shovel has its own id, and only built shovels are sold
    let mut built = HashSet::new();
    for line in lines.iter().filter(|l| !l.ends_with(" sold")) {
        assert!(built.insert(shovel_id(line)), "duplicate shovel: {}", line);
    }
    let mut sold = HashSet::new();
    for line in lines.iter().filter(|l| l.ends_with(" sold")) {
        let id = shovel_id(line);
        assert!(built.contains(&id), "sold unknown shovel: {}", line);
        assert!(sold.insert(id), "shovel sold twice: {}", line);
    }
}

#[test]
fn test_shutdown_is_idempotent_and_bounded() {
    let mut factory =
        FactorySimulation::new(fast_config(), Arc::new(MemoryEventLog::new())).unwrap();
    factory.start().unwrap();
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let first = factory.shutdown().unwrap();
    let second = factory.shutdown().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(first, second);
    assert_eq!(factory.pool_state(), PoolState::Stopped);
}

#[test]
fn test_external_signal_ends_run_early() {
    let mut factory =
        FactorySimulation::new(fast_config(), Arc::new(MemoryEventLog::new())).unwrap();
    let signal = factory.shutdown_signal();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        signal.trigger();
    });

    let started = Instant::now();
    factory.run_for(Duration::from_secs(60)).unwrap();
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = fast_config().with_restock_target(0);
    let result = FactorySimulation::new(config, Arc::new(MemoryEventLog::new()));
    assert!(matches!(result, Err(FactoryError::InvalidConfig(_))));

    let config = fast_config().with_worker_threads(2);
    let result = FactorySimulation::new(config, Arc::new(MemoryEventLog::new()));
    assert!(matches!(result, Err(FactoryError::InvalidConfig(_))));
}

#[test]
fn test_concurrent_dealers_restock_only_the_deficit() {
    const DEALERS: usize = 10;
    const TARGET: usize = 50;

    let ids = Arc::new(IdAllocator::new());
    let handles = Arc::new(BoundedBuffer::new("handles", 100).unwrap());
    let blades = Arc::new(BoundedBuffer::new("blades", 100).unwrap());
    let shovels = Arc::new(BoundedBuffer::new("shovels", 100).unwrap());
    for _ in 0..41 {
        let shovel = Shovel::assemble(
            ids.next_shovel_id(),
            ids.make_component(ComponentKind::Handle),
            ids.make_component(ComponentKind::Blade),
        )
        .unwrap();
        shovels.put(shovel).unwrap();
    }
    for _ in 0..100 {
        handles.put(ids.make_component(ComponentKind::Handle)).unwrap();
        blades.put(ids.make_component(ComponentKind::Blade)).unwrap();
    }

    let sink = Arc::new(MemoryEventLog::new());
    let log = EventLog::new(sink.clone());
    let stats = Arc::new(ProductionStats::new());
    let workshop = Workshop::new(
        handles,
        blades,
        ids,
        Duration::from_millis(1),
        ShutdownSignal::new(),
    );

    let barrier = Arc::new(Barrier::new(DEALERS));
    let dealers: Vec<_> = (0..DEALERS)
        .map(|id| {
            let dealer = Dealer::new(
                id,
                workshop.clone(),
                Arc::clone(&shovels),
                TARGET,
                log.clone(),
                Arc::clone(&stats),
            );
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                dealer.serve_once().unwrap().restocked
            })
        })
        .collect();

    let restocked: usize = dealers.into_iter().map(|d| d.join().unwrap()).sum();

    // The first sale leaves 40 (deficit 10); each later sale is one more
    assert_eq!(restocked, 10 + (DEALERS - 1));
    assert_eq!(shovels.len(), TARGET);
    assert_eq!(shovels.reserved(), 0);
    assert_eq!(sink.count_action(ProductionAction::Produced), restocked);
    assert_eq!(sink.count_action(ProductionAction::Sold), DEALERS);
}

#[test]
fn test_file_log_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shovel_log.txt");
    let config = fast_config().with_event_log_path(&path);

    let mut factory = FactorySimulation::with_file_log(config).unwrap();
    let snapshot = factory.run_for(Duration::from_millis(300)).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count() as u64, snapshot.shovels_built() + snapshot.sold);
}

#[test]
fn test_restock_at_full_capacity_keeps_selling() {
    let config = FactoryConfig::new()
        .with_buffer_capacities(2)
        .with_suppliers(1, 1)
        .with_assemblers(2)
        .with_dealers(1)
        .with_supply_intervals(1, 1)
        .with_assembly_delay(1)
        .with_restock_target(2)
        .with_shutdown_timeout(5_000);
    let mut factory = FactorySimulation::new(config, Arc::new(MemoryEventLog::new())).unwrap();

    let snapshot = factory.run_for(Duration::from_millis(500)).unwrap();

    // Assemblers compete with the dealer's restock for the same two slots
    assert!(snapshot.sold >= 5, "dealer stalled: {}", snapshot);
    assert!(snapshot.restocked > 0);
    assert_eq!(factory.pool_state(), PoolState::Stopped);
    assert_eq!(factory.shovels().reserved(), 0);
}
