use crate::prelude_crate::*;
use colored::*;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------- NUMBER FORMATTING

const G_PRECISION: usize = 6;

/// Formats `value` the way C's `%g` does: six significant digits, trailing
/// zeros dropped, exponent form below `1e-4` or from `1e6` on.
///
/// # Examples
///
/// ```
/// use dropimpact::io::format_g;
///
/// assert_eq!(format_g(0.001), "0.001");
/// assert_eq!(format_g(0.010000000000000002), "0.01");
/// assert_eq!(format_g(1.5e-5), "1.5e-05");
/// assert_eq!(format_g(1234567.0), "1.23457e+06");
/// ```
pub fn format_g(value: Float) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let scientific = format!("{:.*e}", G_PRECISION - 1, value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };
    if exponent < -4 || exponent >= G_PRECISION as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{}{:02}",
            strip_zeros(mantissa),
            sign,
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (G_PRECISION as i32 - 1 - exponent) as usize;
        strip_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// C's `%1.4f`, which spells missing values as `nan`.
fn format_fixed4(value: Float) -> String {
    if value.is_nan() {
        "nan".to_string()
    } else {
        format!("{value:.4}")
    }
}

// ------------------------------------------------------------------------- OUTPUT LAYOUT

/// Where every artifact of a run lives, relative to the output root.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    root: PathBuf,
    case_name: String,
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(root: P, case_name: &str) -> Self {
        OutputLayout {
            root: root.into(),
            case_name: case_name.to_string(),
        }
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    pub fn get_case_name(&self) -> &str {
        &self.case_name
    }

    pub fn interface_log(&self) -> PathBuf {
        self.root.join(INTERFACE_LOG_FILE)
    }

    pub fn stats_log(&self) -> PathBuf {
        self.root.join(STATS_LOG_FILE)
    }

    pub fn restart(&self) -> PathBuf {
        self.root.join(RESTART_FILE)
    }

    pub fn slice(&self, time: Float) -> PathBuf {
        self.root
            .join(SLICES_PATH)
            .join(format!("{}-{time:.2}.gfs", self.case_name))
    }

    /// Thresholded half-space facets, e.g. `interfacesDropRaw-0.010.dat`.
    pub fn raw_facets(&self, phase: &str, time: Float) -> PathBuf {
        self.root
            .join(INTERFACES_PATH)
            .join(format!("interfaces{phase}Raw-{time:.3}.dat"))
    }

    /// Full-domain facets, e.g. `interfacesLiquid-0.0.dat`.
    pub fn clean_facets(&self, phase: &str, time: Float) -> PathBuf {
        self.root
            .join(INTERFACES_PATH)
            .join(format!("interfaces{phase}-{time:.1}.dat"))
    }

    pub fn animation(&self, view: &str) -> PathBuf {
        self.root.join(ANIMATIONS_PATH).join(format!("{view}.mp4"))
    }
}

pub fn create_case_directories(root: &Path) -> ImpactResult<()> {
    for name in [SLICES_PATH, ANIMATIONS_PATH, INTERFACES_PATH] {
        let path = root.join(name);
        let path_str = path.display().to_string();
        if !path.exists() {
            println!("Creating the {} path.\n", path_str.yellow().bold());
            fs::create_dir_all(&path).map_err(|e| ImpactError::path(&path, e))?;
        } else {
            println!("The {} path already exists.\n", path_str.yellow().bold());
        }
    }
    Ok(())
}

/// Creates (or truncates) `path` and hands a buffered writer to `write`.
/// The file is closed before returning.
pub fn write_file<F>(path: &Path, write: F) -> ImpactResult<()>
where
    F: FnOnce(&mut dyn Write) -> ImpactResult<()>,
{
    let file = File::create(path).map_err(|e| ImpactError::path(path, e))?;
    let mut out = BufWriter::new(file);
    write(&mut out)?;
    out.flush()?;
    Ok(())
}

// ------------------------------------------------------------------------------- RECORDS

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterfaceRecord {
    pub iteration: usize,
    pub time: Float,
    pub volume: Float,
    /// Interface extent along x, y and z; `None` with no interface cells.
    pub extents: [Option<(Float, Float)>; 3],
}

impl fmt::Display for InterfaceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ",
            self.iteration,
            format_g(self.time),
            format_fixed4(self.volume)
        )?;
        for extent in self.extents {
            let (low, high) = extent.unwrap_or((Float::NAN, Float::NAN));
            write!(f, "{} {} ", format_fixed4(low), format_fixed4(high))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsRecord {
    pub iteration: usize,
    pub time: Float,
    pub dt: Float,
    pub cells: usize,
    pub wall: Float,
    pub cpu: Float,
}

impl fmt::Display for StatsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i: {} t: {} dt: {} #Cells: {} Wall clock time (s): {} CPU time (s): {} ",
            self.iteration,
            format_g(self.time),
            format_g(self.dt),
            self.cells,
            format_g(self.wall),
            format_g(self.cpu)
        )
    }
}

// -------------------------------------------------------------------- DiagnosticsWriter

/// The two run logs, held open for the whole run and appended to so a
/// resumed run keeps the earlier rows. Every row is flushed as written.
#[derive(Debug)]
pub struct DiagnosticsWriter {
    interface: BufWriter<File>,
    stats: BufWriter<File>,
}

impl DiagnosticsWriter {
    pub fn open(layout: &OutputLayout) -> ImpactResult<Self> {
        Ok(DiagnosticsWriter {
            interface: open_log(&layout.interface_log())?,
            stats: open_log(&layout.stats_log())?,
        })
    }

    pub fn write_interface(&mut self, record: &InterfaceRecord) -> ImpactResult<()> {
        writeln!(self.interface, "{record}")?;
        self.interface.flush()?;
        Ok(())
    }

    pub fn write_stats(&mut self, record: &StatsRecord) -> ImpactResult<()> {
        writeln!(self.stats, "{record}")?;
        self.stats.flush()?;
        Ok(())
    }
}

impl Drop for DiagnosticsWriter {
    fn drop(&mut self) {
        let _ = self.interface.flush();
        let _ = self.stats.flush();
    }
}

fn open_log(path: &Path) -> ImpactResult<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ImpactError::path(path, e))?;
    Ok(BufWriter::new(file))
}
