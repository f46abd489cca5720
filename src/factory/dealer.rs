use super::workshop::Workshop;
use crate::core::buffer::BoundedBuffer;
use crate::core::errors::{FactoryError, Result};
use crate::core::event_log::{ActorKind, EventLog, ProductionAction, ProductionEvent};
use crate::core::stats::ProductionStats;
use crate::core::types::Shovel;
use log::{error, info};
use std::sync::Arc;

/// Result of one dealer cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sale {
    pub sold_shovel: u64,
    /// Shovels built to restock after the sale
    pub restocked: usize,
}

/// Sells shovels and restocks the shovel buffer back to its target level.
///
/// The sale and the restock decision happen in one step on the buffer
/// ([`BoundedBuffer::take_and_reserve`]), so concurrent dealers split the
/// deficit between them instead of each producing the whole of it.
pub struct Dealer {
    id: usize,
    workshop: Workshop,
    shovels: Arc<BoundedBuffer<Shovel>>,
    restock_target: usize,
    log: EventLog,
    stats: Arc<ProductionStats>,
}

impl Dealer {
    pub fn new(
        id: usize,
        workshop: Workshop,
        shovels: Arc<BoundedBuffer<Shovel>>,
        restock_target: usize,
        log: EventLog,
        stats: Arc<ProductionStats>,
    ) -> Self {
        Self {
            id,
            workshop,
            shovels,
            restock_target,
            log,
            stats,
        }
    }

    pub fn run(self) {
        info!("[Dealer {}] Started", self.id);
        while !self.workshop.signal().is_triggered() {
            match self.serve_once() {
                Ok(_) => {}
                Err(FactoryError::Cancelled) => break,
                Err(e) => {
                    error!("[Dealer {}] Stopping: {}", self.id, e);
                    break;
                }
            }
        }
        info!("[Dealer {}] Stopped", self.id);
    }

    /// Sell the oldest shovel, then build and stock exactly the shovels
    /// reserved for this sale.
    pub fn serve_once(&self) -> Result<Sale> {
        let (sold, mut reservation) = self.shovels.take_and_reserve(self.restock_target)?;
        self.stats.record_sold();
        self.log.record(&ProductionEvent::new(
            ActorKind::Dealer,
            self.id,
            &sold,
            ProductionAction::Sold,
        ));
        let sold_shovel = sold.id();
        drop(sold);

        let deficit = reservation.remaining();
        if deficit > 0 {
            info!(
                "[Dealer {}] Stock below {}, restocking {} shovel(s)",
                self.id, self.restock_target, deficit
            );
        }

        while !reservation.is_fulfilled() {
            let shovel = self.workshop.build_shovel()?;
            let event = ProductionEvent::new(
                ActorKind::Dealer,
                self.id,
                &shovel,
                ProductionAction::Produced,
            );
            reservation.fulfill(shovel)?;
            self.stats.record_restocked();
            self.log.record(&event);
        }

        Ok(Sale {
            sold_shovel,
            restocked: deficit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event_log::MemoryEventLog;
    use crate::core::shutdown::ShutdownSignal;
    use crate::core::types::{ComponentKind, IdAllocator};
    use std::time::Duration;

    fn stocked_dealer(
        stock: u64,
        target: usize,
        parts: u64,
    ) -> (Dealer, Arc<BoundedBuffer<Shovel>>, Arc<MemoryEventLog>) {
        let ids = Arc::new(IdAllocator::new());
        let handles = Arc::new(BoundedBuffer::new("handles", 100).unwrap());
        let blades = Arc::new(BoundedBuffer::new("blades", 100).unwrap());
        let shovels = Arc::new(BoundedBuffer::new("shovels", 100).unwrap());

        for _ in 0..stock {
            let shovel = Shovel::assemble(
                ids.next_shovel_id(),
                ids.make_component(ComponentKind::Handle),
                ids.make_component(ComponentKind::Blade),
            )
            .unwrap();
            shovels.put(shovel).unwrap();
        }
        for _ in 0..parts {
            handles.put(ids.make_component(ComponentKind::Handle)).unwrap();
            blades.put(ids.make_component(ComponentKind::Blade)).unwrap();
        }

        let sink = Arc::new(MemoryEventLog::new());
        let workshop = Workshop::new(
            handles,
            blades,
            ids,
            Duration::from_millis(1),
            ShutdownSignal::new(),
        );
        let dealer = Dealer::new(
            3,
            workshop,
            Arc::clone(&shovels),
            target,
            EventLog::new(sink.clone()),
            Arc::new(ProductionStats::new()),
        );
        (dealer, shovels, sink)
    }

    #[test]
    fn test_sale_above_target_does_not_restock() {
        let (dealer, shovels, sink) = stocked_dealer(10, 5, 0);
        let sale = dealer.serve_once().unwrap();

        assert_eq!(sale, Sale { sold_shovel: 1, restocked: 0 });
        assert_eq!(shovels.len(), 9);
        assert_eq!(sink.lines(), vec!["Dealer 3: Shovel 1 (Handle: 1, Blade: 1) sold"]);
    }

    #[test]
    fn test_sale_restocks_exact_deficit() {
        let (dealer, shovels, sink) = stocked_dealer(41, 50, 20);
        let sale = dealer.serve_once().unwrap();

        assert_eq!(sale.restocked, 10);
        assert_eq!(shovels.len(), 50);
        assert_eq!(shovels.reserved(), 0);
        assert_eq!(sink.count_action(ProductionAction::Sold), 1);
        assert_eq!(sink.count_action(ProductionAction::Produced), 10);

        let snapshot = dealer.stats.snapshot();
        assert_eq!(snapshot.sold, 1);
        assert_eq!(snapshot.restocked, 10);
    }

    #[test]
    fn test_restocked_shovels_use_fresh_parts() {
        let (dealer, shovels, sink) = stocked_dealer(1, 1, 1);
        dealer.serve_once().unwrap();

        let restocked = shovels.take().unwrap();
        assert_eq!(restocked.id(), 2);
        assert_eq!(restocked.handle().id(), 2);
        assert_eq!(restocked.blade().id(), 2);
        assert_eq!(
            sink.lines()[1],
            "Dealer 3: Shovel 2 (Handle: 2, Blade: 2) produced"
        );
    }
}
