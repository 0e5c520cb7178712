//! In-memory chain, token and wallet doubles shared by the unit tests.

use crate::types::{
    BalanceProof, ChannelError, ChannelKey, ChannelManager, Ledger, LiveChannel, Result, Token,
    TypedDataSigner,
};
use crate::utils::balance_proof_hash;
use async_trait::async_trait;
use ethers::{
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, TransactionReceipt, H256, U256},
};
use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};
use tokio::sync::mpsc;

pub(crate) fn create_test_wallet() -> LocalWallet {
    LocalWallet::from_str("1234567890123456789012345678901234567890123456789012345678901234")
        .unwrap()
}

pub(crate) fn receiver_address() -> Address {
    Address::from_low_u64_be(0x5601)
}

#[derive(Clone, Debug)]
pub(crate) struct CloseCall {
    pub proof: BalanceProof,
    pub sender_signature: Bytes,
    pub receiver_signature: Option<Bytes>,
}

#[derive(Default)]
struct ChainState {
    head: u64,
    nonce: u64,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    deposits: HashMap<ChannelKey, U256>,
    settled: HashSet<ChannelKey>,
    receipts: HashMap<H256, u64>,
    close_events: Vec<(ChannelKey, u64)>,
    settle_events: Vec<(ChannelKey, u64)>,
    closes: Vec<CloseCall>,
    submitted: Vec<&'static str>,
    rejected: HashSet<&'static str>,
    subscriptions: Vec<mpsc::Sender<u64>>,
}

/// Token, channel manager and ledger in one. Transactions are mined into the
/// next block as soon as they are submitted.
pub(crate) struct MockChain {
    token: Address,
    manager: Address,
    decimals: u32,
    state: Mutex<ChainState>,
    mining: AtomicBool,
    register_deposits: AtomicBool,
    fail_receipts: AtomicBool,
    blocks_per_subscription: AtomicUsize,
    finite_subscriptions: AtomicBool,
    channel_info_calls: AtomicUsize,
}

impl MockChain {
    pub fn new(decimals: u32) -> Self {
        Self {
            token: Address::from_low_u64_be(0x70c3),
            manager: Address::from_low_u64_be(0x3a9a),
            decimals,
            state: Mutex::new(ChainState {
                head: 1000,
                ..Default::default()
            }),
            mining: AtomicBool::new(true),
            register_deposits: AtomicBool::new(true),
            fail_receipts: AtomicBool::new(false),
            blocks_per_subscription: AtomicUsize::new(64),
            finite_subscriptions: AtomicBool::new(false),
            channel_info_calls: AtomicUsize::new(0),
        }
    }

    pub fn fund(&self, account: Address, amount: u64) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(account, U256::from(amount));
    }

    pub fn balance(&self, account: Address) -> U256 {
        let state = self.state.lock().unwrap();
        state.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn set_mining(&self, mining: bool) {
        self.mining.store(mining, Ordering::SeqCst);
    }

    pub fn set_register_deposits(&self, register: bool) {
        self.register_deposits.store(register, Ordering::SeqCst);
    }

    pub fn set_fail_receipts(&self, fail: bool) {
        self.fail_receipts.store(fail, Ordering::SeqCst);
    }

    pub fn set_blocks_per_subscription(&self, blocks: usize) {
        self.blocks_per_subscription.store(blocks, Ordering::SeqCst);
    }

    /// New subscriptions end after their prefilled blocks.
    pub fn set_finite_subscriptions(&self, finite: bool) {
        self.finite_subscriptions.store(finite, Ordering::SeqCst);
    }

    pub fn reject(&self, method: &'static str) {
        self.state.lock().unwrap().rejected.insert(method);
    }

    /// Puts an open channel on chain without going through a deposit.
    pub fn open_onchain(&self, key: ChannelKey, deposit: u64) {
        self.state
            .lock()
            .unwrap()
            .deposits
            .insert(key, U256::from(deposit));
    }

    pub fn push_close_event(&self, key: ChannelKey, block: u64) {
        self.state.lock().unwrap().close_events.push((key, block));
    }

    pub fn push_settle_event(&self, key: ChannelKey, block: u64) {
        let mut state = self.state.lock().unwrap();
        state.settle_events.push((key, block));
        state.deposits.remove(&key);
        state.settled.insert(key);
    }

    pub fn deposit_of(&self, key: &ChannelKey) -> Option<U256> {
        self.state.lock().unwrap().deposits.get(key).copied()
    }

    pub fn submitted(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn closes(&self) -> Vec<CloseCall> {
        self.state.lock().unwrap().closes.clone()
    }

    pub fn channel_info_calls(&self) -> usize {
        self.channel_info_calls.load(Ordering::SeqCst)
    }

    pub fn subscriptions_closed(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.subscriptions.is_empty() && state.subscriptions.iter().all(|s| s.is_closed())
    }

    /// Mines `method` into the next block, applying `effect` to chain state.
    fn submit(
        &self,
        method: &'static str,
        effect: impl FnOnce(&mut ChainState, u32) -> Result<()>,
    ) -> Result<H256> {
        let mut state = self.state.lock().unwrap();
        if state.rejected.contains(method) {
            return Err(ChannelError::Ledger(format!("{} reverted", method)));
        }
        let block = state.head + 1;
        effect(&mut *state, block as u32)?;
        state.head = block;
        state.nonce += 1;
        let tx = H256::from_low_u64_be(state.nonce);
        if self.mining.load(Ordering::SeqCst) {
            state.receipts.insert(tx, block);
        }
        state.submitted.push(method);
        Ok(tx)
    }

    fn register(&self, state: &mut ChainState, key: ChannelKey, amount: U256) {
        if self.register_deposits.load(Ordering::SeqCst) {
            *state.deposits.entry(key).or_default() += amount;
        }
    }
}

fn debit(state: &mut ChainState, account: Address, amount: U256) -> Result<()> {
    let balance = state.balances.entry(account).or_default();
    if *balance < amount {
        return Err(ChannelError::Ledger("transfer amount exceeds balance".into()));
    }
    *balance -= amount;
    Ok(())
}

fn take_allowance(state: &mut ChainState, owner: Address, spender: Address, amount: U256) -> Result<()> {
    let allowance = state.allowances.entry((owner, spender)).or_default();
    if *allowance < amount {
        return Err(ChannelError::Ledger("allowance too low".into()));
    }
    *allowance -= amount;
    Ok(())
}

#[async_trait]
impl Ledger for MockChain {
    async fn transaction_receipt(&self, tx: H256) -> Result<Option<TransactionReceipt>> {
        if self.fail_receipts.load(Ordering::SeqCst) {
            return Err(ChannelError::Ledger("connection reset".into()));
        }
        let state = self.state.lock().unwrap();
        Ok(state.receipts.get(&tx).map(|block| TransactionReceipt {
            transaction_hash: tx,
            block_number: Some((*block).into()),
            ..Default::default()
        }))
    }

    async fn subscribe_blocks(&self) -> Result<mpsc::Receiver<u64>> {
        let blocks = self.blocks_per_subscription.load(Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(blocks.max(1));
        let mut state = self.state.lock().unwrap();
        for offset in 1..=blocks as u64 {
            let _ = sender.try_send(state.head + offset);
        }
        if !self.finite_subscriptions.load(Ordering::SeqCst) {
            state.subscriptions.push(sender);
        }
        Ok(receiver)
    }
}

#[async_trait]
impl Token for MockChain {
    fn address(&self) -> Address {
        self.token
    }

    async fn name(&self) -> Result<String> {
        Ok("Test Token".into())
    }

    async fn symbol(&self) -> Result<String> {
        Ok("TKN".into())
    }

    async fn decimals(&self) -> Result<u32> {
        Ok(self.decimals)
    }

    async fn balance_of(&self, account: Address) -> Result<U256> {
        Ok(self.balance(account))
    }

    async fn approve(&self, from: Address, spender: Address, amount: U256) -> Result<H256> {
        self.submit("approve", |state, _| {
            state.allowances.insert((from, spender), amount);
            Ok(())
        })
    }

    async fn transfer_with_data(
        &self,
        from: Address,
        to: Address,
        amount: U256,
        data: Bytes,
    ) -> Result<H256> {
        let manager = self.manager;
        self.submit("transfer", |state, block| {
            debit(state, from, amount)?;
            if to != manager {
                return Ok(());
            }
            if data.len() < 20 {
                return Err(ChannelError::Ledger("bad transfer data".into()));
            }
            let receiver = Address::from_slice(&data[..20]);
            let open_block = match data.len() {
                20 => block,
                24 => u32::from_be_bytes([data[20], data[21], data[22], data[23]]),
                _ => return Err(ChannelError::Ledger("bad transfer data".into())),
            };
            let key = ChannelKey {
                sender: from,
                receiver,
                open_block,
            };
            self.register(state, key, amount);
            Ok(())
        })
    }

    async fn mint(&self, from: Address, value: U256) -> Result<H256> {
        self.submit("mint", |state, _| {
            *state.balances.entry(from).or_default() += value;
            Ok(())
        })
    }
}

#[async_trait]
impl ChannelManager for MockChain {
    fn address(&self) -> Address {
        self.manager
    }

    async fn create_channel(
        &self,
        from: Address,
        receiver: Address,
        deposit: U256,
    ) -> Result<H256> {
        let manager = self.manager;
        self.submit("createChannel", |state, block| {
            take_allowance(state, from, manager, deposit)?;
            debit(state, from, deposit)?;
            let key = ChannelKey {
                sender: from,
                receiver,
                open_block: block,
            };
            self.register(state, key, deposit);
            Ok(())
        })
    }

    async fn top_up(
        &self,
        from: Address,
        receiver: Address,
        open_block: u32,
        deposit: U256,
    ) -> Result<H256> {
        let manager = self.manager;
        self.submit("topUp", |state, _| {
            take_allowance(state, from, manager, deposit)?;
            debit(state, from, deposit)?;
            let key = ChannelKey {
                sender: from,
                receiver,
                open_block,
            };
            self.register(state, key, deposit);
            Ok(())
        })
    }

    async fn close(
        &self,
        from: Address,
        proof: &BalanceProof,
        sender_signature: &Bytes,
        receiver_signature: Option<&Bytes>,
    ) -> Result<H256> {
        let call = CloseCall {
            proof: *proof,
            sender_signature: sender_signature.clone(),
            receiver_signature: receiver_signature.cloned(),
        };
        self.submit("close", |state, block| {
            let key = ChannelKey {
                sender: from,
                receiver: proof.receiver,
                open_block: proof.open_block,
            };
            state.close_events.push((key, block as u64));
            if call.receiver_signature.is_some() {
                state.settle_events.push((key, block as u64));
                state.deposits.remove(&key);
                state.settled.insert(key);
            }
            state.closes.push(call);
            Ok(())
        })
    }

    async fn settle(&self, from: Address, receiver: Address, open_block: u32) -> Result<H256> {
        self.submit("settle", |state, block| {
            let key = ChannelKey {
                sender: from,
                receiver,
                open_block,
            };
            state.settle_events.push((key, block as u64));
            state.deposits.remove(&key);
            state.settled.insert(key);
            Ok(())
        })
    }

    async fn channel_info(&self, key: &ChannelKey) -> Result<LiveChannel> {
        self.channel_info_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.settled.contains(key) {
            return Err(ChannelError::Ledger("getChannelInfo reverted".into()));
        }
        Ok(LiveChannel {
            deposit: state.deposits.get(key).copied().unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn close_requested_events(&self, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>> {
        let state = self.state.lock().unwrap();
        Ok(matching(&state.close_events, key, from_block))
    }

    async fn settled_events(&self, key: &ChannelKey, from_block: u64) -> Result<Vec<u64>> {
        let state = self.state.lock().unwrap();
        Ok(matching(&state.settle_events, key, from_block))
    }
}

fn matching(events: &[(ChannelKey, u64)], key: &ChannelKey, from_block: u64) -> Vec<u64> {
    let mut blocks: Vec<u64> = events
        .iter()
        .filter(|(k, block)| k == key && *block >= from_block)
        .map(|(_, block)| *block)
        .collect();
    blocks.sort_unstable();
    blocks
}

/// Local wallet that counts signing requests and can be told to refuse.
pub(crate) struct CountingSigner {
    wallet: LocalWallet,
    requests: AtomicUsize,
    refuse: AtomicBool,
}

impl CountingSigner {
    pub fn new() -> Self {
        Self {
            wallet: create_test_wallet(),
            requests: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

#[async_trait]
impl TypedDataSigner for CountingSigner {
    async fn sign_balance_proof(&self, _account: Address, proof: &BalanceProof) -> Result<Bytes> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ChannelError::Signer("User denied message signature".into()));
        }
        let signature = self
            .wallet
            .sign_hash(balance_proof_hash(proof)?)
            .map_err(|e| ChannelError::Signer(e.to_string()))?;
        Ok(Bytes::from(signature.to_vec()))
    }
}
