// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use failure::{err_msg, Error};
use num::Complex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::{warn, Level};

use orbitplot::presets::{self, Scene, TreeShape};
use orbitplot::systems::Duffing;
use orbitplot::{CancelToken, ColorScheme, DynamicalSystem, PixelFormat, ToneCurve};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn parse_complex(s: &str) -> Option<Complex<f64>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const OUTPUT: &str = "output";
const SIZE: &str = "size";
const SUBPIXELS: &str = "subpixels";
const ITERATIONS: &str = "iterations";
const THREADS: &str = "threads";
const SEED: &str = "seed";
const GAMMA: &str = "gamma";
const COLOR: &str = "color";
const DEPTH: &str = "depth";
const TIME_LIMIT: &str = "time-limit";
const VERBOSE: &str = "verbose";
const QUIET: &str = "quiet";

const LEFTLOWER: &str = "leftlower";
const RIGHTUPPER: &str = "rightupper";
const CONSTANT: &str = "constant";
const EXPONENT: &str = "exponent";
const FORCING: &str = "forcing";
const DAMPING: &str = "damping";
const LAYERS: &str = "layers";
const ANGLE: &str = "angle";
const SHAPE: &str = "shape";
const LEFT_P: &str = "left-p";

// The options every renderer takes.  Anything left unset keeps the
// renderer's own default.
fn common<'a>(default_size: &'a str) -> Vec<Arg<'a, 'a>> {
    let max_threads = num_cpus::get();

    vec![
        Arg::with_name(OUTPUT)
            .required(true)
            .long(OUTPUT)
            .short("o")
            .takes_value(true)
            .help("Output file; .png, .pgm or .pam"),
        Arg::with_name(SIZE)
            .long(SIZE)
            .short("s")
            .takes_value(true)
            .default_value(default_size)
            .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
            .help("Size of output image"),
        Arg::with_name(SUBPIXELS)
            .long(SUBPIXELS)
            .short("p")
            .takes_value(true)
            .validator(|s| {
                validate_range(
                    &s,
                    1,
                    1_000_000,
                    "Could not parse sample count",
                    "Samples per pixel must be between 1 and 1000000",
                )
            })
            .help("Orbits seeded per sample pixel"),
        Arg::with_name(ITERATIONS)
            .long(ITERATIONS)
            .short("i")
            .takes_value(true)
            .validator(|s| {
                validate_range(
                    &s,
                    1,
                    100_000_000,
                    "Could not parse iteration count",
                    "Iteration count must be between 1 and 100000000",
                )
            })
            .help("Longest orbit traced"),
        Arg::with_name(THREADS)
            .long(THREADS)
            .short("t")
            .takes_value(true)
            .validator(move |s| {
                validate_range(
                    &s,
                    1,
                    max_threads,
                    "Could not parse thread count",
                    &format!("Thread count must be between 1 and {}", max_threads),
                )
            })
            .help("Number of threads to use in solver; one per CPU if absent"),
        Arg::with_name(SEED)
            .long(SEED)
            .takes_value(true)
            .validator(|s| u64::from_str(&s).map(|_| ()).map_err(|_| "Could not parse seed".to_string()))
            .help("Seed for the random generators; random if absent"),
        Arg::with_name(GAMMA)
            .long(GAMMA)
            .short("g")
            .takes_value(true)
            .validator(|s| {
                validate_range(
                    &s,
                    0.01,
                    10.0,
                    "Could not parse gamma",
                    "Gamma must be between 0.01 and 10",
                )
            })
            .help("Exponent of the tone curve"),
        Arg::with_name(COLOR)
            .long(COLOR)
            .short("c")
            .takes_value(true)
            .possible_values(&["gray", "bleed", "heat"])
            .help("Color policy"),
        Arg::with_name(DEPTH)
            .long(DEPTH)
            .short("d")
            .takes_value(true)
            .possible_values(&["8", "16"])
            .help("Bits per channel"),
        Arg::with_name(TIME_LIMIT)
            .long(TIME_LIMIT)
            .takes_value(true)
            .validator(|s| {
                validate_range(
                    &s,
                    0.001,
                    1.0e9,
                    "Could not parse time limit",
                    "The time limit must be between 0.001 and 1000000000 seconds",
                )
            })
            .help("Stop sampling after this many seconds and write what there is"),
    ]
}

fn real<'a>(name: &'a str, default: &'a str, help: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .allow_hyphen_values(true)
        .default_value(default)
        .validator(|s| f64::from_str(&s).map(|_| ()).map_err(|_| "Could not parse number".to_string()))
        .help(help)
}

fn point<'a>(name: &'a str, short: &'a str, default: &'a str, help: &'a str) -> Arg<'a, 'a> {
    Arg::with_name(name)
        .long(name)
        .short(short)
        .takes_value(true)
        .allow_hyphen_values(true)
        .default_value(default)
        .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse complex number"))
        .help(help)
}

fn args<'a>() -> ArgMatches<'a> {
    App::new("orbits")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Stochastic orbit renderers")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name(VERBOSE)
                .long(VERBOSE)
                .short("v")
                .global(true)
                .conflicts_with(QUIET)
                .help("Log per-thread progress"),
        )
        .arg(
            Arg::with_name(QUIET)
                .long(QUIET)
                .short("q")
                .global(true)
                .help("Log only warnings"),
        )
        .subcommand(
            SubCommand::with_name("buddha")
                .about("Buddhabrot renderer")
                .args(&common("800x600"))
                .arg(point(
                    LEFTLOWER,
                    "l",
                    "-2.103,-1.238",
                    "Left lower corner of the mandelbrot space",
                ))
                .arg(point(
                    RIGHTUPPER,
                    "r",
                    "1.201,1.240",
                    "Right upper corner of the mandelbrot space",
                )),
        )
        .subcommand(
            SubCommand::with_name("escape")
                .about("Orbits of an alternating escape map, with overflow glow")
                .args(&common("2560x1440"))
                .arg(point(CONSTANT, "k", "0.09,-0.575", "The additive constant"))
                .arg(real(EXPONENT, "5", "Exponent of the even steps; odd steps use one more")),
        )
        .subcommand(
            SubCommand::with_name("julia")
                .about("Smooth escape-time Julia set")
                .args(&common("2560x1440"))
                .arg(point(CONSTANT, "k", "0.7,0.42", "The additive constant"))
                .arg(real(EXPONENT, "6", "The exponent")),
        )
        .subcommand(
            SubCommand::with_name("poincare")
                .about("Poincare section of a driven Duffing oscillator")
                .args(&common("2560x1440"))
                .arg(real(FORCING, "32.657", "Amplitude of the driving force"))
                .arg(real(DAMPING, "0.018", "Damping coefficient")),
        )
        .subcommand(
            SubCommand::with_name("tree")
                .about("Random walk over an IFS tree")
                .args(&common("2560x1440"))
                .arg(
                    Arg::with_name(LAYERS)
                        .long(LAYERS)
                        .takes_value(true)
                        .default_value("20")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1,
                                40,
                                "Could not parse layer count",
                                "Layer count must be between 1 and 40",
                            )
                        })
                        .help("Junctions from trunk to tip"),
                )
                .arg(real(ANGLE, "0.6", "Branch angle in radians"))
                .arg(
                    Arg::with_name(SHAPE)
                        .long(SHAPE)
                        .takes_value(true)
                        .default_value("symmetric")
                        .possible_values(&["symmetric", "balanced", "random"])
                        .help("How the junctions split"),
                )
                .arg(
                    Arg::with_name(LEFT_P)
                        .long(LEFT_P)
                        .takes_value(true)
                        .default_value("0.4")
                        .validator(|s| {
                            validate_range(
                                &s,
                                0.01,
                                0.99,
                                "Could not parse branch share",
                                "The left branch share must be between 0.01 and 0.99",
                            )
                        })
                        .help("Share of the left branch in a balanced tree"),
                ),
        )
        .get_matches()
}

fn value<T>(matches: &ArgMatches, name: &str) -> Result<T, Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = matches
        .value_of(name)
        .ok_or_else(|| err_msg(format!("missing value for --{}", name)))?;
    Ok(T::from_str(raw)?)
}

fn complex(matches: &ArgMatches, name: &str) -> Result<Complex<f64>, Error> {
    matches
        .value_of(name)
        .and_then(parse_complex)
        .ok_or_else(|| err_msg(format!("Error parsing --{}", name)))
}

fn size(matches: &ArgMatches) -> Result<(usize, usize), Error> {
    matches
        .value_of(SIZE)
        .and_then(|s| parse_pair::<usize>(s, 'x'))
        .ok_or_else(|| err_msg("Error parsing image dimensions"))
}

fn apply_common<S>(scene: &mut Scene<S>, matches: &ArgMatches) -> Result<(), Error> {
    if matches.is_present(SUBPIXELS) {
        scene.config.policy.sub_pixels = value(matches, SUBPIXELS)?;
    }
    if matches.is_present(ITERATIONS) {
        scene.config.policy.max_iterations = value(matches, ITERATIONS)?;
    }
    if matches.is_present(THREADS) {
        scene.config.workers = value(matches, THREADS)?;
    }
    if matches.is_present(SEED) {
        scene.config.seed = Some(value(matches, SEED)?);
    }
    if matches.is_present(GAMMA) {
        scene.curve = ToneCurve::new(value(matches, GAMMA)?);
    }
    match matches.value_of(COLOR) {
        Some("gray") => scene.color = ColorScheme::Gray,
        Some("bleed") => scene.color = ColorScheme::Bleed { gain: 2.5 },
        Some("heat") => scene.color = ColorScheme::Heat,
        _ => {}
    }

    let gray = match matches.value_of(COLOR) {
        Some(color) => color == "gray",
        None => scene.format == PixelFormat::Gray8 || scene.format == PixelFormat::Gray16,
    };
    let deep = match matches.value_of(DEPTH) {
        Some(depth) => depth == "16",
        None => scene.format == PixelFormat::Rgba16 || scene.format == PixelFormat::Gray16,
    };
    scene.format = match (gray, deep) {
        (true, false) => PixelFormat::Gray8,
        (true, true) => PixelFormat::Gray16,
        (false, false) => PixelFormat::Rgba8,
        (false, true) => PixelFormat::Rgba16,
    };
    Ok(())
}

fn finish<S: DynamicalSystem>(mut scene: Scene<S>, matches: &ArgMatches) -> Result<(), Error> {
    apply_common(&mut scene, matches)?;

    let cancel = CancelToken::new();
    if matches.is_present(TIME_LIMIT) {
        let seconds: f64 = value(matches, TIME_LIMIT)?;
        let timer = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs_f64(seconds));
            timer.cancel();
        });
    }

    let output = matches
        .value_of(OUTPUT)
        .ok_or_else(|| err_msg("no output file given"))?;
    let rendered = scene.render_to(output, &cancel)?;
    if !rendered.is_complete() {
        warn!(
            completeness = rendered.completeness(),
            "time limit reached; the image was drawn from part of the samples"
        );
    }
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<(), Error> {
    match matches.subcommand() {
        ("buddha", Some(sub)) => {
            let (width, height) = size(sub)?;
            let scene = presets::buddha(width, height, complex(sub, LEFTLOWER)?, complex(sub, RIGHTUPPER)?)?;
            finish(scene, sub)
        }
        ("escape", Some(sub)) => {
            let (width, height) = size(sub)?;
            let scene = presets::escape(width, height, value(sub, EXPONENT)?, complex(sub, CONSTANT)?)?;
            finish(scene, sub)
        }
        ("julia", Some(sub)) => {
            let (width, height) = size(sub)?;
            let scene = presets::julia(width, height, value(sub, EXPONENT)?, complex(sub, CONSTANT)?)?;
            finish(scene, sub)
        }
        ("poincare", Some(sub)) => {
            let (width, height) = size(sub)?;
            let equation = Duffing {
                gamma: value(sub, FORCING)?,
                delta: value(sub, DAMPING)?,
                ..Duffing::default()
            };
            finish(presets::poincare(width, height, equation)?, sub)
        }
        ("tree", Some(sub)) => {
            let (width, height) = size(sub)?;
            let shape = match sub.value_of(SHAPE) {
                Some("balanced") => TreeShape::Balanced,
                Some("random") => TreeShape::Random,
                _ => TreeShape::Symmetric,
            };
            let mut rng = match sub.value_of(SEED) {
                Some(seed) => StdRng::seed_from_u64(u64::from_str(seed)?),
                None => StdRng::from_entropy(),
            };
            let tree = shape.grow(value(sub, LAYERS)?, value(sub, ANGLE)?, value(sub, LEFT_P)?, &mut rng)?;
            finish(presets::tree(width, height, tree)?, sub)
        }
        _ => Err(err_msg("no renderer chosen")),
    }
}

fn init_tracing(matches: &ArgMatches) {
    let sub = matches.subcommand().1;
    let present = |name: &str| matches.is_present(name) || sub.map_or(false, |s| s.is_present(name));
    let level = if present(VERBOSE) {
        Level::DEBUG
    } else if present(QUIET) {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let matches = args();
    init_tracing(&matches);

    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
