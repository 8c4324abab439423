use futures::stream::FuturesUnordered;
use futures::{SinkExt, StreamExt};
use log::{debug, error, trace, warn};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use crate::detector::Detector;
use crate::error::DetectionError;
use crate::events::{DetectionEvent, EventRx};
use crate::models::RouteUpdate;

/// One line of the intake stream
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Inbound {
    /// Reply to an ongoing-hijack request
    Ongoing { ongoing: Vec<RouteUpdate> },
    Update(RouteUpdate),
}

fn parse_line(line: &str) -> Option<Inbound> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(inbound) => Some(inbound),
        Err(err) => {
            warn!("Ignoring malformed input ({}): {}", err, line);
            None
        }
    }
}

fn spawn_update(detector: &Detector, update: RouteUpdate) -> JoinHandle<()> {
    let detector = detector.clone();
    tokio::spawn(async move { detector.handle_update(update).await })
}

fn spawn_inbound(detector: &Detector, inbound: Inbound) -> JoinHandle<()> {
    match inbound {
        Inbound::Update(update) => spawn_update(detector, update),
        Inbound::Ongoing { ongoing } => {
            let detector = detector.clone();
            tokio::spawn(async move { detector.handle_ongoing(ongoing).await })
        }
    }
}

/// Classify every update read from `reader` (one JSON document per line),
/// writing the resulting events to `writer` as JSON lines.
///
/// Each update runs in its own task. Synthesized updates are fed back into
/// intake instead of being written out. Returns once the input is exhausted
/// and every update it caused has been handled.
pub async fn serve<R, W>(
    detector: Detector,
    reader: R,
    writer: W,
    mut events: EventRx,
) -> Result<(), DetectionError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new());
    let mut output = FramedWrite::new(writer, LinesCodec::new());
    let mut tasks: FuturesUnordered<JoinHandle<()>> = FuturesUnordered::new();
    let mut input_done = false;

    loop {
        tokio::select! {
            line = lines.next(), if !input_done => match line {
                Some(Ok(line)) => {
                    if let Some(inbound) = parse_line(&line) {
                        tasks.push(spawn_inbound(&detector, inbound));
                    }
                }
                Some(Err(err)) => {
                    error!("Reading input: {}", err);
                    input_done = true;
                }
                None => {
                    debug!("Input closed, finishing {} in-flight updates", tasks.len());
                    input_done = true;
                }
            },
            Some(event) = events.recv() => {
                emit(&detector, event, &mut output, &mut tasks).await?;
            },
            Some(joined) = tasks.next(), if !tasks.is_empty() => {
                if let Err(err) = joined {
                    error!("Detector task failed: {}", err);
                }
            },
        }

        if input_done && tasks.is_empty() {
            // Flush what's left; stop unless it produced more work
            while let Ok(event) = events.try_recv() {
                emit(&detector, event, &mut output, &mut tasks).await?;
            }
            if tasks.is_empty() {
                break;
            }
        }
    }
    Ok(())
}

async fn emit<W>(
    detector: &Detector,
    event: DetectionEvent,
    output: &mut FramedWrite<W, LinesCodec>,
    tasks: &mut FuturesUnordered<JoinHandle<()>>,
) -> Result<(), DetectionError>
where
    W: AsyncWrite + Unpin,
{
    match event {
        DetectionEvent::Intake { update } => {
            trace!("Feeding back {}", update);
            tasks.push(spawn_update(detector, update));
        }
        event => output.send(serde_json::to_string(&event)?).await?,
    }
    Ok(())
}
