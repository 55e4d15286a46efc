use crate::*;

use crate::config::Config;
use crate::control::{Controller, RepairRequest, TemplateSource};
use crate::fixbank::FixBank;
use crate::manifest::ManifestArtifact;
use crate::oracle::Violation;
use crate::propose::HintProposer;
use crate::repair::RepairStatus;
use crate::synthesize::SynthConfig;

use ansi_term::Color::*;
use instant::Duration;
use std::path::PathBuf;

fn load_artifact(input: &PathBuf) -> Result<ManifestArtifact, String> {
    let artifact = if input.is_dir() {
        ManifestArtifact::from_dir(input, "*.json")
    } else {
        ManifestArtifact::from_file(input)
    };
    artifact.map_err(|e| {
        format!("{} {}", Red.bold().paint("error:"), e)
    })
}

fn print_violation(violation: &Violation) {
    println!(
        "  {} {}\n    {} {}",
        Yellow.bold().paint(&violation.id),
        violation.message,
        Fixed(8).paint("at"),
        Fixed(8).paint(violation.path.join(" / "))
    );
}

fn resolve_bank(
    fixbank: Option<PathBuf>,
    no_fixbank: bool,
    config: &Config,
) -> Option<FixBank> {
    if no_fixbank {
        return None;
    }
    fixbank
        .or_else(|| config.fixbank.as_ref().map(PathBuf::from))
        .map(FixBank::open)
}

fn resolve_synth_config(
    config: &Config,
    max_candidates: Option<usize>,
    timeout: Option<u64>,
) -> SynthConfig {
    let mut synth = config.synth_config();
    if let Some(max_candidates) = max_candidates {
        synth.max_candidates = max_candidates;
    }
    if let Some(timeout) = timeout {
        synth.timeout = Duration::from_secs(timeout);
    }
    synth
}

#[allow(clippy::too_many_arguments)]
pub fn repair(
    input: PathBuf,
    out: Option<PathBuf>,
    output_filename: Option<String>,
    max_candidates: Option<usize>,
    timeout: Option<u64>,
    max_iters: Option<usize>,
    config_path: Option<PathBuf>,
    fixbank: Option<PathBuf>,
    no_fixbank: bool,
    quiet: bool,
) -> Result<(), String> {
    let config = Config::load(config_path.as_deref())?;
    let artifact = load_artifact(&input)?;

    let mut controller = Controller::new().with_proposer(Box::new(HintProposer));
    if let Some(bank) = resolve_bank(fixbank, no_fixbank, &config) {
        controller = controller.with_bank(bank);
    }

    let request = RepairRequest {
        default_template: demos::default_template_and_holes(&artifact).ok(),
        max_iters: max_iters.unwrap_or_else(|| config.max_iters()),
        config: resolve_synth_config(&config, max_candidates, timeout),
        ..RepairRequest::default()
    };

    let oracles = policies::standard_oracles();
    let report = controller
        .repair_artifact(&artifact, &oracles, request)
        .map_err(|e| format!("{} {}", Red.bold().paint("error:"), e))?;

    if !quiet {
        let source = match report.template_source {
            Some(TemplateSource::FixBank) => "fix bank",
            Some(TemplateSource::Proposer) => "proposer",
            Some(TemplateSource::Default) => "default template",
            Some(TemplateSource::Provided) => "provided template",
            None => "none needed",
        };
        println!(
            "{} {} {}",
            Cyan.bold().paint("status:"),
            report.outcome.status,
            Fixed(8).paint(format!(
                "({} iterations, {} candidates, {} constraints, template: {})",
                report.outcome.iterations,
                report.outcome.tried_candidates,
                report.outcome.constraints.len(),
                source
            ))
        );
    }

    match report.outcome.status {
        RepairStatus::Success => {
            if let Some(out) = out {
                report
                    .outcome
                    .artifact
                    .write_to_dir(&out, output_filename.as_deref())?;
                if !quiet {
                    println!(
                        "{} {}",
                        Green.bold().paint("wrote repaired manifests to"),
                        out.display()
                    );
                }
            } else if !quiet {
                for (path, doc) in &report.outcome.artifact.files {
                    println!(
                        "{}\n{}",
                        Green.bold().paint(path),
                        serde_json::to_string_pretty(doc)
                            .map_err(|e| e.to_string())?
                    );
                }
            }
            Ok(())
        }
        status => {
            if !quiet {
                println!(
                    "{}",
                    Red.bold().paint("remaining violations:")
                );
                for violation in &report.outcome.violations {
                    print_violation(violation);
                }
            }
            Err(format!(
                "{} repair did not converge ({})",
                Red.bold().paint("error:"),
                status
            ))
        }
    }
}

pub fn check(
    input: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<(), String> {
    // Config is loaded for parity with `repair` (env/file validation), even
    // though checking needs no budgets.
    Config::load(config_path.as_deref())?;
    let artifact = load_artifact(&input)?;

    let oracles = policies::standard_oracles();
    let violations = oracle::check_all(&artifact, &oracles).map_err(
        |(name, e)| {
            format!(
                "{} oracle '{}' failed: {}",
                Red.bold().paint("error:"),
                name,
                e
            )
        },
    )?;

    if violations.is_empty() {
        println!("{}", Green.bold().paint("all oracles pass"));
        Ok(())
    } else {
        println!(
            "{}",
            Red.bold()
                .paint(format!("{} violations:", violations.len()))
        );
        for violation in &violations {
            print_violation(violation);
        }
        Err(format!(
            "{} artifact fails verification",
            Red.bold().paint("error:")
        ))
    }
}

pub fn bank(path: PathBuf) -> Result<(), String> {
    if !path.exists() {
        return Err(format!(
            "{} no fix bank at {}",
            Red.bold().paint("error:"),
            path.display()
        ));
    }
    let bank = FixBank::open(&path);

    println!(
        "{} {}",
        Cyan.bold().paint("fix bank:"),
        Fixed(8).paint(format!(
            "{} ({} entries)",
            path.display(),
            bank.len()
        ))
    );
    for (i, entry) in bank.entries().iter().enumerate() {
        println!(
            "  {}) {} {}\n     {}",
            i + 1,
            Yellow
                .bold()
                .paint(entry.signature.failed_oracles.join(", ")),
            entry.signature.error_codes.join(", "),
            Fixed(8).paint(format!(
                "{} ops, {} holes, {} constraints, succeeded {} time(s)",
                entry.template.ops.len(),
                entry.hole_space.len(),
                entry.learned_constraints.len(),
                entry.metadata.success_count
            ))
        );
    }
    Ok(())
}

/// Repairs the bundled policy-breaking deployment twice: a cold run that
/// searches and learns, then a warm run served from the Fix Bank.
pub fn demo(fixbank: Option<PathBuf>, quiet: bool) -> Result<(), String> {
    let artifact = demos::broken_deployment();
    let (template, hole_space) = demos::demo_template_and_holes();
    let oracles = policies::standard_oracles();

    let bank = match &fixbank {
        Some(path) => FixBank::open(path),
        None => FixBank::in_memory(),
    };
    let mut controller = Controller::new().with_bank(bank);

    for run in ["cold", "warm"] {
        let request = RepairRequest {
            template: Some(template.clone()),
            hole_space: Some(hole_space.clone()),
            ..RepairRequest::default()
        };
        let report = controller
            .repair_artifact(&artifact, &oracles, request)
            .map_err(|e| {
                format!("{} {}", Red.bold().paint("error:"), e)
            })?;

        if !quiet {
            println!(
                "{} {} {}",
                Purple.bold().paint(format!("{} run:", run)),
                report.outcome.status,
                Fixed(8).paint(format!(
                    "({} candidates tried, {} constraints learned, fix bank {})",
                    report.outcome.tried_candidates,
                    report.outcome.constraints.len(),
                    if report.fixbank_hit { "hit" } else { "miss" }
                ))
            );
        }

        if report.outcome.status != RepairStatus::Success {
            return Err(format!(
                "{} demo repair did not converge ({})",
                Red.bold().paint("error:"),
                report.outcome.status
            ));
        }
    }

    if !quiet {
        println!("{}", Green.bold().paint("demo complete"));
    }
    Ok(())
}
