//! Nexus OCR コマンドライン
//!
//! 使い方:
//!   nexus_ocr predict <canvas.png>
//!   nexus_ocr feedback <canvas.png> <label>
//!   nexus_ocr interactive
//!   nexus_ocr init-config

use nexus_ocr_lib::model::AppConfig;
#[cfg(feature = "ml")]
use nexus_ocr_lib::{AppState, CanvasSnapshot, FeedbackSession, SessionAction, SessionResponse};

fn usage() {
    eprintln!("Usage:");
    eprintln!("  nexus_ocr predict <canvas.png>");
    eprintln!("  nexus_ocr feedback <canvas.png> <label>");
    eprintln!("  nexus_ocr interactive");
    eprintln!("  nexus_ocr init-config");
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
        std::process::exit(2);
    }

    let result = if args[0] == "init-config" && args.len() == 1 {
        init_config()
    } else {
        run(&args)
    };
    if let Err(e) = result {
        eprintln!("エラー: {:#}", e);
        std::process::exit(1);
    }
}

/// 既定値の設定ファイルを書き出す。既存のファイルは上書きしない
fn init_config() -> anyhow::Result<()> {
    let path = AppConfig::default_path();
    if path.exists() {
        println!("設定ファイルは既に存在します: {}", path.display());
        return Ok(());
    }
    AppConfig::default().save_default()?;
    println!("✓ 設定ファイルを作成しました: {}", path.display());
    Ok(())
}

#[cfg(not(feature = "ml"))]
fn run(_args: &[String]) -> anyhow::Result<()> {
    anyhow::bail!("nexus_ocr was built without the `ml` feature; no classifier is available")
}

#[cfg(feature = "ml")]
fn run(args: &[String]) -> anyhow::Result<()> {
    let config = AppConfig::load_or_default();
    config.log_summary();
    let state = AppState::from_config(&config)?;
    let mut session = state.new_session();

    match (args[0].as_str(), &args[1..]) {
        ("predict", [png]) => {
            let response = predict_file(&mut session, &state, png)?;
            print_response(&response);
        }
        ("feedback", [png, label]) => {
            let response = predict_file(&mut session, &state, png)?;
            print_response(&response);
            if matches!(response, SessionResponse::Prediction { .. }) {
                let response = session.handle(SessionAction::SubmitCorrection(label.clone()), &state);
                print_response(&response);
            }
        }
        ("interactive", []) => interactive(&mut session, &state)?,
        _ => {
            usage();
            std::process::exit(2);
        }
    }

    Ok(())
}

#[cfg(feature = "ml")]
fn predict_file(
    session: &mut FeedbackSession,
    state: &AppState,
    png: &str,
) -> anyhow::Result<SessionResponse> {
    let snapshot = CanvasSnapshot::from_file(png, session.canvas_generation())?;
    Ok(session.handle(SessionAction::Predict(snapshot), state))
}

#[cfg(feature = "ml")]
fn print_response(response: &SessionResponse) {
    match response {
        SessionResponse::Warning(_) => println!("⚠ {}", response.message()),
        SessionResponse::Error(_) => eprintln!("✗ {}", response.message()),
        SessionResponse::Submitted(outcome) => {
            if outcome.success() {
                println!("✓ {}", outcome.message());
            } else {
                eprintln!("✗ {}", outcome.message());
            }
            for warning in outcome.warnings() {
                println!("⚠ {}", warning);
            }
        }
        _ => println!("{}", response.message()),
    }
}

/// 1行1コマンドの対話セッション
#[cfg(feature = "ml")]
fn interactive(session: &mut FeedbackSession, state: &AppState) -> anyhow::Result<()> {
    use std::io::{BufRead, Write};

    println!("Commands: predict <png> | yes | no <label> | start-over | quit");
    let stdin = std::io::stdin();
    loop {
        print!("[{}] > ", session.stage());
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end_matches(['\r', '\n']);
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        let response = match command {
            "predict" if !rest.is_empty() => match predict_file(session, state, rest.trim()) {
                Ok(response) => response,
                Err(e) => {
                    eprintln!("✗ {:#}", e);
                    continue;
                }
            },
            "yes" => session.handle(SessionAction::ConfirmCorrect, state),
            "no" => session.handle(SessionAction::SubmitCorrection(rest.to_string()), state),
            "start-over" => session.handle(SessionAction::StartOver, state),
            "quit" | "exit" => break,
            "" => continue,
            _ => {
                println!("Commands: predict <png> | yes | no <label> | start-over | quit");
                continue;
            }
        };
        print_response(&response);
    }

    Ok(())
}
