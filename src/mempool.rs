//! Transaction pool: admission queue, validation worker and the accepted list.
//!
//! Submissions go through a bounded queue so callers only ever wait on
//! backpressure. A single worker drains the queue and is the only writer of
//! account state on the pool side: it validates each transaction against the
//! chain's pending state, reserves the sender nonce, moves the funds, records
//! the transaction as accepted and gossips it. The stored head block itself is
//! never touched.

use crate::account::{get_account, update_account};
use crate::blockchain::BlockChain;
use crate::config::PoolConfig;
use crate::crypto::{Address, Hash};
use crate::error::{ChainError, Result};
use crate::network::{Broadcaster, MessageType};
use crate::transaction::Transaction;
use crate::trie::StateTrie;
use parking_lot::Mutex;
use primitive_types::U256;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the admission queue.
pub const TX_POOL_QUEUE_SIZE: usize = 50;

/// Balance a sender is topped up to under [`ValidationMode::Debug`] (10^18).
pub fn debug_top_up() -> U256 {
    U256::exp10(18)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    Strict,
    /// Fund senders that cannot cover the value and accept mismatched nonces.
    Debug,
}

impl From<&PoolConfig> for ValidationMode {
    fn from(config: &PoolConfig) -> Self {
        if config.debug {
            ValidationMode::Debug
        } else {
            ValidationMode::Strict
        }
    }
}

/// Check `tx` against `state` and reserve its nonce.
///
/// On success the sender's nonce has already been incremented and written
/// back, before any funds move.
pub fn validate_transaction<S: StateTrie + ?Sized>(
    state: &mut S,
    tx: &Transaction,
    mode: ValidationMode,
) -> Result<Address> {
    let sender = tx.sender().ok_or(ChainError::InvalidSignature)?;
    let mut account = get_account(state, &sender)?;

    if account.balance < tx.value {
        match mode {
            ValidationMode::Strict => {
                return Err(ChainError::InsufficientFunds {
                    balance: account.balance,
                    value: tx.value,
                })
            }
            ValidationMode::Debug => {
                warn!(
                    "Insufficient balance {} in account {}, topping up for debug",
                    account.balance,
                    hex::encode(sender)
                );
                account.balance = debug_top_up().max(tx.value);
            }
        }
    }

    if account.nonce != tx.nonce {
        let err = ChainError::InvalidNonce {
            expected: account.nonce,
            got: tx.nonce,
        };
        match mode {
            ValidationMode::Strict => return Err(err),
            ValidationMode::Debug => warn!("{}, continuing anyway", err),
        }
    }

    account.nonce += 1;
    update_account(state, &sender, &account)?;
    Ok(sender)
}

/// Move `tx.value` from `sender` to the recipient, creating the recipient at zero.
///
/// Contract creations are only debited here; the contract itself is funded
/// when the block carrying the transaction is assembled.
pub fn process_transaction<S: StateTrie + ?Sized>(
    state: &mut S,
    sender: &[u8],
    tx: &Transaction,
) -> Result<()> {
    let mut from = get_account(state, sender)?;
    if from.balance < tx.value {
        return Err(ChainError::InsufficientFunds {
            balance: from.balance,
            value: tx.value,
        });
    }
    from.balance -= tx.value;
    update_account(state, sender, &from)?;

    if !tx.is_contract() {
        let mut to = get_account(state, &tx.recipient)?;
        to.balance = to.balance.saturating_add(tx.value);
        update_account(state, &tx.recipient, &to)?;
    }

    debug!(
        "Processed transaction {}: {} from {}",
        tx.hash_str(),
        tx.value,
        hex::encode(sender)
    );
    Ok(())
}

fn find_in(pool: &[Transaction], hash: &Hash) -> Option<Transaction> {
    pool.iter().find(|tx| &tx.hash() == hash).cloned()
}

pub struct TransactionPool {
    chain: Arc<RwLock<BlockChain>>,
    speaker: Arc<dyn Broadcaster>,
    mode: ValidationMode,
    accepted: Arc<Mutex<Vec<Transaction>>>,
    queue: mpsc::Sender<Transaction>,
    pending_receiver: Mutex<Option<mpsc::Receiver<Transaction>>>,
    shutdown: watch::Sender<bool>,
    hook: Option<mpsc::UnboundedSender<Transaction>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionPool {
    pub fn new(
        chain: Arc<RwLock<BlockChain>>,
        speaker: Arc<dyn Broadcaster>,
        config: &PoolConfig,
    ) -> Self {
        let (queue, receiver) = mpsc::channel(config.queue_size.max(1));
        let (shutdown, _) = watch::channel(false);

        TransactionPool {
            chain,
            speaker,
            mode: ValidationMode::from(config),
            accepted: Arc::new(Mutex::new(Vec::new())),
            queue,
            pending_receiver: Mutex::new(Some(receiver)),
            shutdown,
            hook: None,
            worker: Mutex::new(None),
        }
    }

    /// Register the observer notified with every accepted transaction.
    pub fn with_hook(mut self, hook: mpsc::UnboundedSender<Transaction>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Spawn the worker. Must be called from within a tokio runtime; later calls are ignored.
    pub fn start(&self) {
        let receiver = match self.pending_receiver.lock().take() {
            Some(receiver) => receiver,
            None => {
                warn!("Transaction pool already started");
                return;
            }
        };

        let worker = PoolWorker {
            chain: self.chain.clone(),
            speaker: self.speaker.clone(),
            mode: self.mode,
            accepted: self.accepted.clone(),
            hook: self.hook.clone(),
        };
        let handle = tokio::spawn(worker.run(receiver, self.shutdown.subscribe()));
        *self.worker.lock() = Some(handle);
        info!("Transaction pool started ({:?} validation)", self.mode);
    }

    /// Enqueue `tx` for validation. Waits only while the queue is full.
    pub async fn queue_transaction(&self, tx: Transaction) -> Result<()> {
        self.queue
            .send(tx)
            .await
            .map_err(|_| ChainError::PoolClosed)
    }

    /// Take every accepted transaction, leaving the pool empty.
    pub fn flush(&self) -> Vec<Transaction> {
        std::mem::take(&mut *self.accepted.lock())
    }

    /// Signal the worker, wait for it to leave its loop, then flush.
    ///
    /// Transactions still in the accepted list are discarded, not returned.
    pub async fn stop(&self) {
        info!("Stopping transaction pool");
        self.shutdown.send_replace(true);
        self.pending_receiver.lock().take();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Transaction pool worker ended abnormally: {}", e);
            }
        }

        let discarded = self.flush();
        info!(
            "Transaction pool stopped, discarded {} accepted transactions",
            discarded.len()
        );
    }

    pub fn find_transaction(&self, hash: &Hash) -> Option<Transaction> {
        find_in(&self.accepted.lock(), hash)
    }

    pub fn len(&self) -> usize {
        self.accepted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accepted.lock().is_empty()
    }
}

struct PoolWorker {
    chain: Arc<RwLock<BlockChain>>,
    speaker: Arc<dyn Broadcaster>,
    mode: ValidationMode,
    accepted: Arc<Mutex<Vec<Transaction>>>,
    hook: Option<mpsc::UnboundedSender<Transaction>>,
}

impl PoolWorker {
    async fn run(
        self,
        mut queue: mpsc::Receiver<Transaction>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        debug!("Transaction pool worker running");
        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = queue.recv() => match received {
                    Some(tx) => self.handle(tx).await,
                    None => break,
                },
            }
        }
        debug!("Transaction pool worker exited");
    }

    async fn handle(&self, tx: Transaction) {
        let hash = tx.hash();
        let duplicate = find_in(&self.accepted.lock(), &hash).is_some();
        if duplicate {
            debug!("Transaction {} already in pool", hex::encode(hash));
            return;
        }

        let applied = {
            let mut chain = self.chain.write().await;
            chain.pending_state_mut().and_then(|state| {
                let sender = validate_transaction(state, &tx, self.mode)?;
                process_transaction(state, &sender, &tx)
            })
        };

        if let Err(e) = applied {
            warn!("Rejected transaction {}: {}", hex::encode(hash), e);
            return;
        }

        self.accepted.lock().push(tx.clone());
        self.speaker.broadcast(MessageType::Tx, tx.encode());
        info!("Accepted transaction {}", hex::encode(hash));

        if let Some(hook) = &self.hook {
            if hook.send(tx).is_err() {
                debug!("Transaction pool hook receiver dropped");
            }
        }
    }
}
