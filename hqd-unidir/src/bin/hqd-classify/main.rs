mod cli;
mod logging;
mod sink;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use hqd_unidir::{load_config_file, HqdConfig, UnidirStreamDispatcher};
use hqd_x::{StreamId, StreamRouter};
use sink::{ClassifySink, Decision};
use std::rc::Rc;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = cli::CliArgs::parse();

    if cli.print_default_config {
        let text = toml::to_string_pretty(&HqdConfig::default())
            .context("Failed to serialize default configuration")?;
        println!("{}", text);
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => HqdConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.validate().map_err(|errors| {
        anyhow!("Configuration validation failed:\n{}", errors.join("\n"))
    })?;
    if cli.chunk_size == 0 {
        bail!("--chunk-size must be at least 1");
    }

    logging::init_logging(&config.logging)?;
    info!(
        streams = cli.streams.len(),
        chunk_size = cli.chunk_size,
        max_pending_streams = config.dispatcher.max_pending_streams,
        "Classifying streams"
    );

    let router = Rc::new(StreamRouter::new());
    let sink = Rc::new(ClassifySink::new(router.clone(), cli.partial_reliability));
    let dispatcher = Rc::new(UnidirStreamDispatcher::new(sink.clone(), config.dispatcher));

    for (index, text) in cli.streams.iter().enumerate() {
        // Client-initiated unidirectional: 2, 6, 10, ...
        let id = StreamId(4 * index as u64 + 2);
        let bytes = parse_hex(text).with_context(|| format!("stream {}: bad hex '{}'", id, text))?;

        router.open_stream(id)?;
        if let Err(err) = dispatcher.take_temporary_ownership(id) {
            sink.record(id, Decision::Refused(err));
            continue;
        }
        router.set_peek_handlers(id, dispatcher.peek_handlers())?;

        if bytes.is_empty() {
            if cli.fin {
                router.receive(id, &[], true)?;
            }
            continue;
        }
        let chunks = bytes.chunks(cli.chunk_size).count();
        for (n, chunk) in bytes.chunks(cli.chunk_size).enumerate() {
            router.receive(id, chunk, cli.fin && n + 1 == chunks)?;
        }
    }

    for (id, decision) in sink.take_decisions() {
        println!("stream {}: {}", id, decision);
    }

    for id in abandon_pending(&dispatcher, &router) {
        println!("stream {}: pending", id);
    }

    Ok(())
}

/// Teardown: release and close every stream that is still unclassified.
fn abandon_pending(
    dispatcher: &UnidirStreamDispatcher<ClassifySink>,
    router: &StreamRouter,
) -> Vec<StreamId> {
    let mut abandoned = Vec::new();
    dispatcher.invoke_on_pending_stream_ids(|id| {
        if dispatcher.release_ownership(id).is_ok() {
            if let Err(err) = router.close_stream(id) {
                warn!(stream_id = %id, %err, "failed to close pending stream");
            }
            abandoned.push(id);
        }
    });
    abandoned
}

/// Parse a hex string, ignoring ASCII whitespace and an optional `0x`.
fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = text
        .trim_start_matches("0x")
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_value(digit: u8) -> Result<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        _ => Err(anyhow!("invalid hex digit '{}'", digit as char)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("0105").unwrap(), vec![0x01, 0x05]);
        assert_eq!(parse_hex("0x40 21").unwrap(), vec![0x40, 0x21]);
        assert_eq!(parse_hex("").unwrap(), Vec::<u8>::new());
        assert!(parse_hex("123").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn test_abandon_pending_closes_unclassified_streams() {
        use hqd_unidir::DispatcherConfig;

        let router = Rc::new(StreamRouter::new());
        let sink = Rc::new(ClassifySink::new(router.clone(), false));
        let dispatcher = Rc::new(UnidirStreamDispatcher::new(sink.clone(), DispatcherConfig::default()));
        for (id, bytes) in [(StreamId(2), &[0x00][..]), (StreamId(6), &[0x01][..])] {
            router.open_stream(id).unwrap();
            dispatcher.take_temporary_ownership(id).unwrap();
            router.set_peek_handlers(id, dispatcher.peek_handlers()).unwrap();
            router.receive(id, bytes, false).unwrap();
        }
        // Closed behind the dispatcher's back: teardown still releases it.
        router.close_stream(StreamId(6)).unwrap();

        assert_eq!(abandon_pending(&dispatcher, &router), vec![StreamId(6)]);
        assert_eq!(dispatcher.number_of_streams(), 0);
        assert!(router.read_offset(StreamId(2)).is_ok());
        assert!(matches!(
            sink.take_decisions().get(&StreamId(2)),
            Some(Decision::Read { .. })
        ));
    }

    #[test]
    fn test_cli_parses() {
        let cli = cli::CliArgs::try_parse_from([
            "hqd-classify",
            "--chunk-size",
            "2",
            "--partial-reliability",
            "00",
            "0105",
        ])
        .unwrap();
        assert_eq!(cli.chunk_size, 2);
        assert!(cli.partial_reliability);
        assert_eq!(cli.streams, vec!["00", "0105"]);
    }
}
