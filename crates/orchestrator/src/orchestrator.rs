//! The single entry point over the domain services.

use std::sync::Arc;
use std::time::Instant;

use common::{ArticleId, WarehouseId};
use domain::{
    Aggregate, CajaAccount, CajaService, CommandResult, DomainConfig, DomainError, DomainEvent,
    InventoryLot, InventoryService, Traspaso, TraspasoWorkflow, WarehouseDirectory,
};
use event_store::{EventStore, TimeoutEventStore};

use crate::publisher::{DomainNotification, EventPublisher};
use crate::request::{DomainRequest, DomainResponse};

/// Wraps a concrete store so every call is bounded by `config.store_timeout`.
pub fn with_store_timeout<S>(store: S, config: &DomainConfig) -> Arc<dyn EventStore>
where
    S: EventStore + 'static,
{
    Arc::new(TimeoutEventStore::new(store, config.store_timeout))
}

/// Routes [`DomainRequest`]s to the caja, inventory and traspaso services.
///
/// Every committed mutation is announced to the [`EventPublisher`]; replays of
/// an idempotency key are not.
#[derive(Clone)]
pub struct DomainOrchestrator {
    cajas: CajaService,
    inventory: InventoryService,
    traspasos: TraspasoWorkflow,
    publisher: Arc<dyn EventPublisher>,
    precision: u32,
}

impl DomainOrchestrator {
    pub fn new(
        store: Arc<dyn EventStore>,
        directory: Arc<dyn WarehouseDirectory>,
        publisher: Arc<dyn EventPublisher>,
        config: DomainConfig,
    ) -> Self {
        Self {
            cajas: CajaService::new(store.clone(), config.clone()),
            inventory: InventoryService::new(store.clone(), &config),
            traspasos: TraspasoWorkflow::new(store, directory, config.clone()),
            publisher,
            precision: config.currency_precision,
        }
    }

    pub fn cajas(&self) -> &CajaService {
        &self.cajas
    }

    pub fn inventory(&self) -> &InventoryService {
        &self.inventory
    }

    pub fn traspasos(&self) -> &TraspasoWorkflow {
        &self.traspasos
    }

    #[tracing::instrument(skip(self, request), fields(operation = request.operation()))]
    pub async fn handle(&self, request: DomainRequest) -> Result<DomainResponse, DomainError> {
        let operation = request.operation();
        let started = Instant::now();

        let result = self.dispatch(request).await;

        let outcome = match &result {
            Ok(response) if response.replayed() => "replayed",
            Ok(_) => "ok",
            Err(error) => error.code(),
        };
        metrics::counter!("domain_requests_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("domain_request_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn dispatch(&self, request: DomainRequest) -> Result<DomainResponse, DomainError> {
        let p = self.precision;
        match request {
            DomainRequest::OpenCaja(cmd) => {
                let result = self.cajas.open(cmd).await?;
                self.announce(&result, |caja: &CajaAccount| {
                    format!(
                        "caja opened at {} by {} with {}",
                        display(caja.branch()),
                        display(caja.operator()),
                        caja.opening_balance().display(p)
                    )
                })
                .await;
                Ok(caja_response(result))
            }
            DomainRequest::PostEntry(cmd) => {
                let (kind, amount) = (cmd.kind, cmd.amount);
                let result = self.cajas.post(cmd).await?;
                self.announce(&result, |caja: &CajaAccount| {
                    format!(
                        "{kind} {} posted, balance {}",
                        amount.display(p),
                        caja.balance().display(p)
                    )
                })
                .await;
                Ok(caja_response(result))
            }
            DomainRequest::CloseCaja(cmd) => {
                let result = self.cajas.close(cmd).await?;
                self.announce(&result, |caja: &CajaAccount| {
                    format!("caja closed with balance {}", caja.balance().display(p))
                })
                .await;
                Ok(caja_response(result))
            }
            DomainRequest::GetCaja(id) => Ok(DomainResponse::Caja {
                caja: self.cajas.get_caja(id).await?,
                replayed: false,
            }),
            DomainRequest::GetBalance(id) => {
                Ok(DomainResponse::Balance(self.cajas.get_balance(id).await?))
            }
            DomainRequest::GetSummary(id) => {
                Ok(DomainResponse::Summary(self.cajas.get_summary(id).await?))
            }
            DomainRequest::GetEntries(id) => {
                Ok(DomainResponse::Entries(self.cajas.get_entries(id).await?))
            }
            DomainRequest::GetOpenCaja { branch, operator } => Ok(DomainResponse::OpenCaja(
                self.cajas.get_open_caja(&branch, &operator).await?,
            )),

            DomainRequest::DebitStock(cmd) => {
                let (warehouse, article) = (cmd.warehouse.clone(), cmd.article.clone());
                let units = cmd.movement.quantity;
                let result = self.inventory.debit(cmd).await?;
                self.announce(&result, |lot: &InventoryLot| {
                    format!(
                        "{units} of {article} debited at {warehouse}, {} left",
                        lot.quantity()
                    )
                })
                .await;
                Ok(lot_response(result, &warehouse, &article))
            }
            DomainRequest::CreditStock(cmd) => {
                let (warehouse, article) = (cmd.warehouse.clone(), cmd.article.clone());
                let units = cmd.movement.quantity;
                let result = self.inventory.credit(cmd).await?;
                self.announce(&result, |lot: &InventoryLot| {
                    format!(
                        "{units} of {article} credited at {warehouse}, {} on hand",
                        lot.quantity()
                    )
                })
                .await;
                Ok(lot_response(result, &warehouse, &article))
            }
            DomainRequest::GetLot { warehouse, article } => Ok(DomainResponse::Lot {
                lot: self.inventory.get_lot(&warehouse, &article).await?,
                replayed: false,
            }),

            DomainRequest::RequestTraspaso(cmd) => {
                let result = self.traspasos.request(cmd).await?;
                self.announce(&result, |t: &Traspaso| {
                    format!(
                        "traspaso {} -> {} requested with {} line(s)",
                        display(t.origin()),
                        display(t.destination()),
                        t.lines().len()
                    )
                })
                .await;
                Ok(traspaso_response(result))
            }
            DomainRequest::ApproveTraspaso(cmd) => {
                let result = self.traspasos.approve(cmd).await?;
                self.announce(&result, |t: &Traspaso| {
                    format!("traspaso approved, {} unit(s) in transit", t.in_transit())
                })
                .await;
                Ok(traspaso_response(result))
            }
            DomainRequest::ReceiveTraspaso(cmd) => {
                let result = self.traspasos.receive(cmd).await?;
                self.announce(&result, |t: &Traspaso| {
                    format!("traspaso received at {}", display(t.destination()))
                })
                .await;
                Ok(traspaso_response(result))
            }
            DomainRequest::RejectTraspaso(cmd) => {
                let result = self.traspasos.reject(cmd).await?;
                self.announce(&result, |t: &Traspaso| {
                    format!(
                        "traspaso rejected: {}",
                        t.rejection_reason().unwrap_or_default()
                    )
                })
                .await;
                Ok(traspaso_response(result))
            }
            DomainRequest::GetTraspaso(id) => Ok(DomainResponse::Traspaso {
                traspaso: self.traspasos.get_traspaso(id).await?,
                replayed: false,
            }),
        }
    }

    /// Publishes one notification for a committed command, named after its
    /// first event.
    async fn announce<A, F>(&self, result: &CommandResult<A>, summary: F)
    where
        A: Aggregate,
        F: FnOnce(&A) -> String,
    {
        if result.replayed {
            return;
        }
        let (Some(event), Some(id)) = (result.events.first(), result.aggregate.id()) else {
            return;
        };
        self.publisher
            .publish(DomainNotification::new(
                event.event_type(),
                id,
                summary(&result.aggregate),
            ))
            .await;
    }
}

fn display<T: std::fmt::Display>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

fn caja_response(result: CommandResult<CajaAccount>) -> DomainResponse {
    DomainResponse::Caja {
        caja: result.aggregate,
        replayed: result.replayed,
    }
}

fn traspaso_response(result: CommandResult<Traspaso>) -> DomainResponse {
    DomainResponse::Traspaso {
        traspaso: result.aggregate,
        replayed: result.replayed,
    }
}

fn lot_response(
    result: CommandResult<InventoryLot>,
    warehouse: &WarehouseId,
    article: &ArticleId,
) -> DomainResponse {
    DomainResponse::Lot {
        lot: result.aggregate.stock_level(warehouse, article),
        replayed: result.replayed,
    }
}
