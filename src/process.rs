use std::io::{self, BufRead, Write};

use chrono::Local;
use log::{info, warn};

use crate::block::{BlockId, ScanRange};
use crate::checkpoint::CheckpointStore;
use crate::config::Args;
use crate::request::NspdClient;
use crate::scanner::{ScanReport, ScanState, Scanner};
use crate::shutdown::Shutdown;
use crate::{
    info_time, prompt, Error, Result, DEFAULT_END, DEFAULT_START, MAX_PARCEL_NUM, MIN_PARCEL_NUM,
};

/// Scans one cadastral block against the registry, asking the operator for
/// anything `args` leaves open or gets wrong.
pub async fn process_block(args: &Args) -> Result<ScanReport> {
    let start_time = Local::now();

    let mut input = io::stdin().lock();
    let mut out = io::stdout();
    let block = resolve_block(args, &mut input, &mut out)?;
    let store = CheckpointStore::new(&args.output_dir);
    let state = initial_state(args, &store, block, &mut input, &mut out).await?;
    drop(input);

    let client = NspdClient::new(&args.lookup_config(), &state.range.block)?;
    let shutdown = Shutdown::new();
    shutdown.listen_for_ctrl_c();
    info!("Results will be saved to: {}", store.dir().display());

    let block = state.range.block.clone();
    let report = Scanner::new(client, store, args.policy(), state)
        .run(&shutdown)
        .await?;
    info_time!(start_time, "Finished processing block {}", block);

    Ok(report)
}

/// The block from `--block`, or from the operator when missing or malformed.
fn resolve_block<R: BufRead, W: Write>(args: &Args, input: &mut R, out: &mut W) -> Result<BlockId> {
    if let Some(block) = &args.block {
        match block.parse() {
            Ok(block) => return Ok(block),
            Err(e) => warn!("{e}"),
        }
    }
    prompt::block_id(input, out)
}

/// The state to scan from: the checkpoint of `block` when resuming, a fresh
/// state over the requested range otherwise.
async fn initial_state<R: BufRead, W: Write>(
    args: &Args,
    store: &CheckpointStore,
    block: BlockId,
    input: &mut R,
    out: &mut W,
) -> Result<ScanState> {
    if let Some(state) = resume_or_restart(args, store, &block, input, out).await? {
        return Ok(state);
    }
    Ok(ScanState::new(scan_range(args, block, input, out)?))
}

/// Loads the previous state of `block` if there is one and the operator wants
/// it, otherwise clears it away.
async fn resume_or_restart<R: BufRead, W: Write>(
    args: &Args,
    store: &CheckpointStore,
    block: &BlockId,
    input: &mut R,
    out: &mut W,
) -> Result<Option<ScanState>> {
    if !store.exists(block).await {
        return Ok(None);
    }

    let resume = if args.resume {
        true
    } else if args.restart {
        false
    } else {
        prompt::resume(input, out)?
    };

    if resume {
        let state = store.load(block).await;
        if state.is_none() {
            warn!("Couldn't load the previous progress of {block}, starting over");
        }
        return Ok(state);
    }

    info!("Discarding the previous progress of {block}");
    if !store.discard(block).await {
        warn!(
            "Stale files of {block} stay in {} until the first save with parcels",
            store.dir().display()
        );
    }
    Ok(None)
}

fn scan_range<R: BufRead, W: Write>(
    args: &Args,
    block: BlockId,
    input: &mut R,
    out: &mut W,
) -> Result<ScanRange> {
    let start = bound_or_prompt(
        args.start,
        "Start at parcel number",
        DEFAULT_START,
        MIN_PARCEL_NUM,
        input,
        out,
    )?;
    let end = bound_or_prompt(
        args.end,
        "End at parcel number",
        DEFAULT_END.max(start),
        start,
        input,
        out,
    )?;
    ScanRange::new(block, start, end)
}

/// `flag` when it lies in `min..=MAX_PARCEL_NUM`, otherwise the operator's answer.
fn bound_or_prompt<R: BufRead, W: Write>(
    flag: Option<u32>,
    label: &str,
    default: u32,
    min: u32,
    input: &mut R,
    out: &mut W,
) -> Result<u32> {
    if let Some(value) = flag {
        if (min..=MAX_PARCEL_NUM).contains(&value) {
            return Ok(value);
        }
        warn!(
            "{}",
            Error::InvalidNumber {
                value: value.to_string(),
                min,
                max: MAX_PARCEL_NUM,
            }
        );
    }
    prompt::bound(input, out, label, default, min, MAX_PARCEL_NUM)
}
