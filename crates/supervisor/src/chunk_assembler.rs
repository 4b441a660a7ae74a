// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ChunkAssembler (C6): coalesces a burst of stderr lines — a stack trace is
//! rarely a single `read()` — into one chunk for the detector. A single
//! pending buffer and a single idle timer, reset on every line and fired
//! when the stream goes quiet (§4.6, §9 Design Note "one timer, not one per
//! line").

use std::time::Duration;
use tokio::sync::mpsc;

pub struct ChunkAssembler {
    idle: Duration,
}

impl ChunkAssembler {
    pub fn new(idle: Duration) -> Self {
        Self { idle }
    }

    /// Runs until `input` closes, forwarding assembled chunks to `output`.
    /// stdout bypasses this entirely — only the stderr reader task feeds it.
    pub async fn run(&self, mut input: mpsc::Receiver<String>, output: mpsc::Sender<String>) {
        let mut buffer = String::new();
        loop {
            let idle = tokio::time::sleep(self.idle);
            tokio::pin!(idle);
            tokio::select! {
                line = input.recv() => {
                    match line {
                        Some(line) => {
                            if !buffer.is_empty() {
                                buffer.push('\n');
                            }
                            buffer.push_str(&line);
                        }
                        None => {
                            flush(&mut buffer, &output).await;
                            return;
                        }
                    }
                }
                () = &mut idle, if !buffer.is_empty() => {
                    flush(&mut buffer, &output).await;
                }
            }
        }
    }
}

async fn flush(buffer: &mut String, output: &mpsc::Sender<String>) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        let _ = output.send(trimmed.to_string()).await;
    }
    buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn coalesces_lines_arriving_before_the_idle_timeout() {
        let assembler = ChunkAssembler::new(Duration::from_millis(30));
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);
        let handle = tokio::spawn(async move { assembler.run(rx_in, tx_out).await });

        tx_in.send("TypeError: boom".to_string()).await.expect("send");
        tx_in.send("    at handler (/src/app.ts:10:5)".to_string()).await.expect("send");
        drop(tx_in);

        let chunk = rx_out.recv().await.expect("assembled chunk");
        assert_eq!(chunk, "TypeError: boom\n    at handler (/src/app.ts:10:5)");
        handle.await.expect("task completes");
    }

    #[tokio::test]
    async fn flushes_on_idle_timeout_even_without_input_closing() {
        let assembler = ChunkAssembler::new(Duration::from_millis(20));
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);
        let handle = tokio::spawn(async move { assembler.run(rx_in, tx_out).await });

        tx_in.send("lone stack frame".to_string()).await.expect("send");
        let chunk = rx_out.recv().await.expect("assembled chunk");
        assert_eq!(chunk, "lone stack frame");

        drop(tx_in);
        handle.await.expect("task completes");
    }

    #[tokio::test]
    async fn two_bursts_separated_by_idle_produce_two_chunks() {
        let assembler = ChunkAssembler::new(Duration::from_millis(20));
        let (tx_in, rx_in) = mpsc::channel(8);
        let (tx_out, mut rx_out) = mpsc::channel(8);
        let handle = tokio::spawn(async move { assembler.run(rx_in, tx_out).await });

        tx_in.send("first burst".to_string()).await.expect("send");
        let first = rx_out.recv().await.expect("first chunk");
        assert_eq!(first, "first burst");

        tx_in.send("second burst".to_string()).await.expect("send");
        let second = rx_out.recv().await.expect("second chunk");
        assert_eq!(second, "second burst");

        drop(tx_in);
        handle.await.expect("task completes");
    }
}
