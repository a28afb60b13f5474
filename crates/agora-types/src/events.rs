//! Lifecycle events and their fan-out machinery.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::commitment::EncryptionLayer;
use crate::escrow::SettleOutcome;
use crate::mandate::{ChainOutcome, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcurementEvent {
	Run(RunEvent),
	Commitment(CommitmentEvent),
	Mandate(MandateEvent),
	Purchase(PurchaseEvent),
	Escrow(EscrowEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
	Started {
		run_id: String,
		query: String,
	},
	PolicyDecided {
		run_id: String,
		layers: Vec<EncryptionLayer>,
	},
	SynthesisReady {
		run_id: String,
	},
	Completed {
		run_id: String,
		outcome: ChainOutcome,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommitmentEvent {
	Committing {
		layer: EncryptionLayer,
	},
	Committed {
		layer: EncryptionLayer,
		reference: String,
	},
	Verified {
		layer: EncryptionLayer,
		reference: String,
		verified: bool,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MandateEvent {
	IntentCreated {
		id: String,
	},
	CartCreated {
		id: String,
		provider: String,
	},
	PaymentCreated {
		id: String,
		escrow_id: String,
	},
	PaymentSettled {
		id: String,
		status: PaymentStatus,
	},
	ChainCompleted {
		outcome: ChainOutcome,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PurchaseEvent {
	Requested {
		provider: String,
	},
	Delivered {
		provider: String,
		protocol_used: bool,
	},
	Failed {
		provider: String,
		error: String,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EscrowEvent {
	Created {
		escrow_id: String,
		seller: String,
		encrypted: bool,
	},
	DeliverySubmitted {
		escrow_id: String,
	},
	Settled {
		escrow_id: String,
		outcome: SettleOutcome,
		reference: String,
	},
	RefundClaimed {
		escrow_id: String,
	},
}

/// Broadcast fan-out for lifecycle events. Subscribers come and go;
/// publishing with no subscribers is not an error.
pub struct EventBus {
	sender: broadcast::Sender<ProcurementEvent>,
}

impl EventBus {
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ProcurementEvent> {
		self.sender.subscribe()
	}

	pub fn publish(
		&self,
		event: ProcurementEvent,
	) -> Result<(), broadcast::error::SendError<ProcurementEvent>> {
		self.sender.send(event)?;
		Ok(())
	}
}

impl Clone for EventBus {
	fn clone(&self) -> Self {
		Self {
			sender: self.sender.clone(),
		}
	}
}

/// Ordered, append-only record of every event in a run, fanned out to
/// bus subscribers as a side channel.
#[derive(Clone)]
pub struct EventLog {
	entries: Arc<Mutex<Vec<ProcurementEvent>>>,
	bus: EventBus,
}

impl EventLog {
	pub fn new(capacity: usize) -> Self {
		Self {
			entries: Arc::new(Mutex::new(Vec::new())),
			bus: EventBus::new(capacity),
		}
	}

	/// Appends the event and forwards it to subscribers. Never blocks on
	/// subscriber progress.
	pub fn record(&self, event: ProcurementEvent) {
		if let Ok(mut entries) = self.entries.lock() {
			entries.push(event.clone());
		}
		self.bus.publish(event).ok();
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ProcurementEvent> {
		self.bus.subscribe()
	}

	/// Copy of everything recorded so far, in emission order.
	pub fn snapshot(&self) -> Vec<ProcurementEvent> {
		self.entries
			.lock()
			.map(|entries| entries.clone())
			.unwrap_or_default()
	}
}

impl Default for EventLog {
	fn default() -> Self {
		Self::new(1024)
	}
}
