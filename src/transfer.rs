//! Bounded producer/consumer bulk copy between streams and external
//! readers/writers.
//!
//! Each call spawns one background worker. The foreground side produces
//! chunks, a bounded channel provides backpressure, and the worker consumes
//! in FIFO order. The worker's first error lands in a single-slot cell and
//! is re-raised after join as `TransferFailure`; a producer error is raised
//! as itself. There is no cancellation: a mid-transfer failure leaves the
//! destination partially written.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use log::debug;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::stream::{BoxedStream, Stream};

/// Maximum number of in-flight chunks between producer and worker.
pub const TRANSFER_QUEUE_DEPTH: usize = 50;

/// Bytes read per chunk.
pub const TRANSFER_CHUNK_SIZE: usize = 64 * 1024;

type ErrorCell = Arc<Mutex<Option<Error>>>;

/// Record the first error; later ones are dropped.
fn record(cell: &ErrorCell, err: Error) {
    let mut slot = cell.lock();
    if slot.is_none() {
        *slot = Some(err);
    }
}

/// Keep receiving without acting so the producer never blocks on a
/// consumer that already failed.
fn drain(rx: &Receiver<Vec<u8>>) {
    for _ in rx.iter() {}
}

fn join_worker<T>(handle: thread::JoinHandle<T>) -> Result<T> {
    handle.join().map_err(|_| {
        Error::transfer(Error::Io(io::Error::new(
            io::ErrorKind::Other,
            "transfer worker panicked",
        )))
    })
}

/// Copy the full contents of `source` into `sink`.
///
/// The sink is handed to the worker thread, flushed at the end, and
/// returned to the caller. It is never closed here.
pub fn download<W>(source: &mut dyn Stream, sink: W) -> Result<W>
where
    W: Write + Send + 'static,
{
    let (tx, rx) = bounded::<Vec<u8>>(TRANSFER_QUEUE_DEPTH);
    let cell: ErrorCell = Arc::new(Mutex::new(None));
    let worker_cell = Arc::clone(&cell);

    let worker = thread::spawn(move || {
        let mut sink = sink;
        for chunk in rx.iter() {
            if let Err(err) = sink.write_all(&chunk) {
                record(&worker_cell, Error::Io(err));
                drain(&rx);
                return sink;
            }
        }
        if let Err(err) = sink.flush() {
            record(&worker_cell, Error::Io(err));
        }
        sink
    });

    let producer_err = produce_from_stream(source, tx);
    let sink = join_worker(worker)?;

    if let Some(err) = cell.lock().take() {
        return Err(Error::transfer(err));
    }
    if let Some(err) = producer_err {
        return Err(err);
    }
    Ok(sink)
}

/// Copy the full contents of `source` into a freshly created file.
///
/// The file is created and closed by this call.
pub fn download_to_path<P: AsRef<Path>>(source: &mut dyn Stream, path: P) -> Result<()> {
    let path = path.as_ref();
    debug!("transfer to file {:?}", path);
    let file = File::create(path)?;
    let mut file = download(source, file)?;
    file.flush()?;
    Ok(())
}

/// Copy the full contents of an external reader into `dest`.
///
/// The worker owns the destination stream for the duration of the copy
/// and hands it back after join. The stream is flushed, not closed.
pub fn upload<R: Read>(dest: BoxedStream, source: &mut R) -> Result<BoxedStream> {
    let (tx, rx) = bounded::<Vec<u8>>(TRANSFER_QUEUE_DEPTH);
    let cell: ErrorCell = Arc::new(Mutex::new(None));
    let worker_cell = Arc::clone(&cell);

    let worker = thread::spawn(move || {
        let mut dest = dest;
        for chunk in rx.iter() {
            if let Err(err) = write_chunk(&mut dest, &chunk) {
                record(&worker_cell, err);
                drain(&rx);
                return dest;
            }
        }
        if let Err(err) = dest.flush() {
            record(&worker_cell, err);
        }
        dest
    });

    let mut producer_err = None;
    let mut total = 0u64;
    loop {
        let mut chunk = vec![0u8; TRANSFER_CHUNK_SIZE];
        match source.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                chunk.truncate(n);
                total += n as u64;
                if tx.send(chunk).is_err() {
                    break;
                }
            }
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                producer_err = Some(Error::Io(err));
                break;
            }
        }
    }
    drop(tx);

    let dest = join_worker(worker)?;
    if let Some(err) = cell.lock().take() {
        return Err(Error::transfer(err));
    }
    if let Some(err) = producer_err {
        return Err(err);
    }
    debug!("uploaded {} bytes", total);
    Ok(dest)
}

/// Push a whole chunk into the destination stream, retrying short writes.
/// A destination that accepts zero bytes with room still pending is an
/// error, never silent truncation.
fn write_chunk(dest: &mut BoxedStream, chunk: &[u8]) -> Result<()> {
    let mut written = 0;
    while written < chunk.len() {
        match dest.write(&chunk[written..])? {
            0 => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!(
                        "destination stopped accepting data ({} of {} bytes written)",
                        written,
                        chunk.len()
                    ),
                )))
            }
            n => written += n,
        }
    }
    Ok(())
}

/// Read chunks from the stream and enqueue them until EOF, a read error,
/// or a dead consumer. Returns the producer-side error, if any.
fn produce_from_stream(
    source: &mut dyn Stream,
    tx: crossbeam_channel::Sender<Vec<u8>>,
) -> Option<Error> {
    let mut total = 0u64;
    loop {
        match source.read(Some(TRANSFER_CHUNK_SIZE)) {
            Ok(chunk) => {
                if chunk.is_empty() {
                    break;
                }
                total += chunk.len() as u64;
                if tx.send(chunk).is_err() {
                    // Receiver dropped: the worker already failed and its
                    // error is in the cell.
                    break;
                }
            }
            Err(err) => return Some(err),
        }
    }
    debug!("produced {} bytes", total);
    None
}
