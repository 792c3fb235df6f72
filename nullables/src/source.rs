//! Nullable ledger source: scripted block responses, recorded fetches.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chainwatch_source::{LedgerSource, SourceError};
use chainwatch_types::{Block, BlockHeight, Transaction};

/// One scripted answer to `block_at`.
#[derive(Clone, Debug)]
pub enum ScriptedFetch {
    Block(Vec<Transaction>),
    NotProduced,
    Error(String),
}

/// A ledger source whose answers are queued per height.
///
/// Each `block_at(h)` pops the next scripted answer for `h`. Once a height's
/// script is exhausted, the last `Block` answer is repeated if there was one,
/// otherwise the height is reported as not yet produced.
pub struct NullLedgerSource {
    head: Mutex<VecDeque<Result<BlockHeight, String>>>,
    scripts: Mutex<HashMap<BlockHeight, VecDeque<ScriptedFetch>>>,
    produced: Mutex<HashMap<BlockHeight, Vec<Transaction>>>,
    fetches: Mutex<Vec<BlockHeight>>,
}

impl NullLedgerSource {
    pub fn new() -> Self {
        Self {
            head: Mutex::new(VecDeque::new()),
            scripts: Mutex::new(HashMap::new()),
            produced: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Queue an answer to the next `current_height` call. The last queued
    /// answer is repeated once the queue runs dry.
    pub fn with_head(self, head: BlockHeight) -> Self {
        self.head.lock().unwrap().push_back(Ok(head));
        self
    }

    pub fn with_head_error(self, message: &str) -> Self {
        self.head.lock().unwrap().push_back(Err(message.to_string()));
        self
    }

    /// Script a produced block at `height`.
    pub fn with_block(self, height: BlockHeight, transactions: Vec<Transaction>) -> Self {
        self.push(height, ScriptedFetch::Block(transactions));
        self
    }

    /// Script a sequence of answers for `height`.
    pub fn with_script(self, height: BlockHeight, script: Vec<ScriptedFetch>) -> Self {
        for step in script {
            self.push(height, step);
        }
        self
    }

    pub fn push(&self, height: BlockHeight, step: ScriptedFetch) {
        self.scripts
            .lock()
            .unwrap()
            .entry(height)
            .or_default()
            .push_back(step);
    }

    /// Every height passed to `block_at`, in call order.
    pub fn fetches(&self) -> Vec<BlockHeight> {
        self.fetches.lock().unwrap().clone()
    }

    /// Number of `block_at` calls made for `height`.
    pub fn fetch_count(&self, height: BlockHeight) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|&&h| h == height)
            .count()
    }
}

impl Default for NullLedgerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerSource for NullLedgerSource {
    async fn current_height(&self) -> Result<BlockHeight, SourceError> {
        let mut head = self.head.lock().unwrap();
        let answer = if head.len() > 1 {
            head.pop_front()
        } else {
            head.front().cloned()
        };
        match answer {
            Some(Ok(h)) => Ok(h),
            Some(Err(msg)) => Err(SourceError::Transport(msg)),
            None => Err(SourceError::Transport("no head scripted".into())),
        }
    }

    async fn block_at(&self, height: BlockHeight) -> Result<Block, SourceError> {
        self.fetches.lock().unwrap().push(height);

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&height)
            .and_then(VecDeque::pop_front);

        match step {
            Some(ScriptedFetch::Block(txs)) => {
                self.produced.lock().unwrap().insert(height, txs.clone());
                Ok(Block::new(height, txs))
            }
            Some(ScriptedFetch::NotProduced) => Ok(Block::not_yet_produced()),
            Some(ScriptedFetch::Error(msg)) => Err(SourceError::Transport(msg)),
            None => Ok(self
                .produced
                .lock()
                .unwrap()
                .get(&height)
                .map(|txs| Block::new(height, txs.clone()))
                .unwrap_or_else(Block::not_yet_produced)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_answers_play_in_order_then_repeat_block() {
        let source = NullLedgerSource::new().with_script(
            3,
            vec![
                ScriptedFetch::Error("boom".into()),
                ScriptedFetch::NotProduced,
                ScriptedFetch::Block(vec![]),
            ],
        );
        assert!(source.block_at(3).await.is_err());
        assert!(!source.block_at(3).await.unwrap().is_produced());
        assert_eq!(source.block_at(3).await.unwrap().number, Some(3));
        assert_eq!(source.block_at(3).await.unwrap().number, Some(3));
        assert!(!source.block_at(4).await.unwrap().is_produced());
        assert_eq!(source.fetch_count(3), 4);
    }

    #[tokio::test]
    async fn head_queue_repeats_last_answer() {
        let source = NullLedgerSource::new()
            .with_head_error("down")
            .with_head(50);
        assert!(source.current_height().await.is_err());
        assert_eq!(source.current_height().await.unwrap(), 50);
        assert_eq!(source.current_height().await.unwrap(), 50);
    }
}
