//! Audio transform pipeline around an ffmpeg child process.
//!
//! The source stream is piped into the transcoder's stdin while stdout and
//! stderr are drained concurrently in the same task, so dropping the request
//! future cancels everything; the child is spawned with `kill_on_drop` and is
//! terminated on every exit path. The transform must fully succeed before the
//! caller may upload anything: on failure the partial output is discarded.

use std::io::ErrorKind;
use std::process::Stdio;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use crate::errors::{FetchError, PipelineError, PipelineResult, TransformError};

/// Bytes of stderr kept as the failure diagnostic.
const STDERR_TAIL_BYTES: usize = 4096;

/// Validated transform parameters.
///
/// Bounds are enforced at the HTTP layer before a process is ever spawned;
/// see [`crate::pipeline::ProcessingRequest`].
#[derive(Debug, Clone, Copy)]
pub struct TranscodeParams {
    /// Seek offset into the source, in seconds.
    pub start_time: f64,
    /// Length of the output window, in seconds.
    pub duration: f64,
    /// Tempo factor applied by the `atempo` filter.
    pub speed: f64,
}

/// Builds the transcoder argument list: read from stdin, trim to the
/// requested window, tempo-scale, encode MP3 to stdout.
pub fn build_args(params: &TranscodeParams) -> Vec<String> {
    vec![
        "-i".to_string(),
        "pipe:0".to_string(),
        "-ss".to_string(),
        format_seconds(params.start_time),
        "-t".to_string(),
        format_seconds(params.duration),
        "-af".to_string(),
        format!("atempo={}", format_seconds(params.speed)),
        "-acodec".to_string(),
        "libmp3lame".to_string(),
        "-f".to_string(),
        "mp3".to_string(),
        "pipe:1".to_string(),
    ]
}

/// Formats a seconds/factor value without a trailing `.0` on whole numbers.
fn format_seconds(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

enum FeedOutcome {
    /// The whole source was written and stdin closed.
    Completed,
    /// The source stream itself failed mid-transfer.
    SourceFailed(FetchError),
    /// The child closed stdin early; its exit status tells the story.
    ChildClosed,
    /// Writing to stdin failed for a reason other than a closed pipe.
    WriteFailed(std::io::Error),
}

/// Runs the transcoder over `source` and collects the transformed bytes.
///
/// A source-stream failure mid-feed surfaces as a fetch error, not a
/// transform error; a non-zero exit surfaces as [`TransformError::Failed`]
/// carrying the tail of the transcoder's stderr.
pub async fn run<S>(
    ffmpeg_path: &str,
    params: &TranscodeParams,
    source: S,
) -> PipelineResult<Bytes>
where
    S: Stream<Item = Result<Bytes, FetchError>> + Unpin,
{
    let args = build_args(params);
    tracing::debug!(command = ffmpeg_path, ?args, "starting transcoder");

    let mut child = Command::new(ffmpeg_path)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| TransformError::Spawn {
            command: ffmpeg_path.to_string(),
            source,
        })?;

    let mut stdin = take_pipe(child.stdin.take(), "stdin")?;
    let mut stdout = take_pipe(child.stdout.take(), "stdout")?;
    let mut stderr = take_pipe(child.stderr.take(), "stderr")?;

    let feed = async {
        let mut source = source;
        let outcome = loop {
            match source.next().await {
                Some(Ok(chunk)) => {
                    if let Err(err) = stdin.write_all(&chunk).await {
                        if err.kind() == ErrorKind::BrokenPipe {
                            break FeedOutcome::ChildClosed;
                        }
                        break FeedOutcome::WriteFailed(err);
                    }
                }
                Some(Err(err)) => break FeedOutcome::SourceFailed(err),
                None => break FeedOutcome::Completed,
            }
        };
        // Dropping stdin delivers EOF so the child can finish and the
        // stdout/stderr readers below unblock.
        drop(stdin);
        outcome
    };

    let collect_stdout = async {
        let mut buffer = Vec::new();
        stdout.read_to_end(&mut buffer).await.map(|_| buffer)
    };

    let collect_stderr = async {
        let mut buffer = Vec::new();
        stderr.read_to_end(&mut buffer).await.map(|_| buffer)
    };

    let (feed_outcome, stdout_result, stderr_result) =
        tokio::join!(feed, collect_stdout, collect_stderr);

    let status = child.wait().await.map_err(TransformError::Pipe)?;

    match feed_outcome {
        FeedOutcome::SourceFailed(err) => return Err(PipelineError::Fetch(err)),
        FeedOutcome::WriteFailed(err) => return Err(TransformError::Pipe(err).into()),
        FeedOutcome::Completed | FeedOutcome::ChildClosed => {}
    }

    let output = stdout_result.map_err(TransformError::Pipe)?;
    let diagnostic = stderr_result.map_err(TransformError::Pipe)?;

    if !status.success() {
        return Err(TransformError::Failed {
            status,
            diagnostic: stderr_tail(&diagnostic),
        }
        .into());
    }

    tracing::debug!(bytes = output.len(), "transcoder finished");
    Ok(Bytes::from(output))
}

fn take_pipe<T>(pipe: Option<T>, name: &str) -> Result<T, TransformError> {
    pipe.ok_or_else(|| TransformError::Pipe(std::io::Error::other(format!("{name} not captured"))))
}

fn stderr_tail(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim_end();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    // Nudge forward to the next char boundary so the slice stays valid.
    let mut start = trimmed.len() - STDERR_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn params(start_time: f64, duration: f64, speed: f64) -> TranscodeParams {
        TranscodeParams {
            start_time,
            duration,
            speed,
        }
    }

    #[test]
    fn args_follow_the_transcoder_contract() {
        let args = build_args(&params(0.0, 5.0, 1.5));
        assert_eq!(
            args,
            vec![
                "-i", "pipe:0", "-ss", "0", "-t", "5", "-af", "atempo=1.5", "-acodec",
                "libmp3lame", "-f", "mp3", "pipe:1",
            ]
        );
    }

    #[test]
    fn unit_speed_keeps_the_tempo_filter_neutral() {
        let args = build_args(&params(0.0, 5.0, 1.0));
        assert!(args.contains(&"atempo=1".to_string()));
    }

    #[test]
    fn doubled_speed_halves_the_window() {
        let args = build_args(&params(2.5, 10.0, 2.0));
        assert!(args.contains(&"atempo=2".to_string()));
        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "10");
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert_eq!(args[ss + 1], "2.5");
    }

    #[test]
    fn stderr_tail_keeps_the_end_of_long_diagnostics() {
        let long = format!("{}END", "x".repeat(10_000));
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("END"));
    }

    #[test]
    fn stderr_tail_is_bounded_in_bytes_for_multibyte_output() {
        // Two-byte characters: a char-counted cut would keep twice the cap.
        let long = "é".repeat(8_000);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.len() <= STDERR_TAIL_BYTES);
        assert!(tail.chars().all(|c| c == 'é'));
    }

    #[test]
    fn stderr_tail_keeps_short_diagnostics_whole() {
        assert_eq!(stderr_tail(b"Invalid data found\n"), "Invalid data found");
    }

    #[cfg(unix)]
    mod with_fake_transcoder {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use tempfile::TempDir;

        /// Writes an executable stand-in for ffmpeg into `dir`.
        fn write_script(dir: &TempDir, body: &str) -> PathBuf {
            let path = dir.path().join("fake-ffmpeg");
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        fn chunks(parts: &[&[u8]]) -> Vec<Result<Bytes, FetchError>> {
            parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect()
        }

        #[tokio::test]
        async fn pipes_source_through_the_child() {
            let dir = TempDir::new().unwrap();
            let script = write_script(&dir, "#!/bin/sh\ncat\n");

            let source = stream::iter(chunks(&[b"hello ", b"snippet"]));
            let output = run(script.to_str().unwrap(), &params(0.0, 5.0, 1.5), source)
                .await
                .unwrap();

            assert_eq!(&output[..], b"hello snippet");
        }

        #[tokio::test]
        async fn non_zero_exit_carries_the_stderr_diagnostic() {
            let dir = TempDir::new().unwrap();
            let script = write_script(
                &dir,
                "#!/bin/sh\ncat > /dev/null\necho 'Invalid data found when processing input' >&2\nexit 1\n",
            );

            let source = stream::iter(chunks(&[b"not audio"]));
            let err = run(script.to_str().unwrap(), &params(0.0, 5.0, 1.5), source)
                .await
                .unwrap_err();

            match err {
                PipelineError::Transform(TransformError::Failed { diagnostic, .. }) => {
                    assert!(diagnostic.contains("Invalid data found"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn source_failure_mid_feed_is_a_fetch_error() {
            let dir = TempDir::new().unwrap();
            let script = write_script(&dir, "#!/bin/sh\ncat\n");

            let source = stream::iter(vec![
                Ok(Bytes::from_static(b"partial")),
                Err(FetchError::Status { status: 404 }),
            ]);
            let err = run(script.to_str().unwrap(), &params(0.0, 5.0, 1.5), source)
                .await
                .unwrap_err();

            assert!(matches!(err, PipelineError::Fetch(_)));
        }

        #[tokio::test]
        async fn early_child_exit_is_reported_from_its_status() {
            let dir = TempDir::new().unwrap();
            // Exits without reading stdin; the feed sees a broken pipe.
            let script = write_script(&dir, "#!/bin/sh\necho nope >&2\nexit 2\n");

            let big = vec![0u8; 1 << 20];
            let source = stream::iter(vec![Ok(Bytes::from(big))]);
            let err = run(script.to_str().unwrap(), &params(0.0, 5.0, 1.5), source)
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                PipelineError::Transform(TransformError::Failed { .. })
            ));
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let source = stream::iter(vec![Ok(Bytes::from_static(b"x"))]);
        let err = run(
            "/nonexistent/transcoder-binary",
            &params(0.0, 5.0, 1.5),
            source,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Transform(TransformError::Spawn { .. })
        ));
    }
}
