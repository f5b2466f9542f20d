//! Arguments of `arts run`, and the stage configurations derived from them.

use crate::antismash::{AntismashConfig, DEFAULT_TIMEOUT};
use crate::duplication::DuplicationConfig;
use crate::phylogeny::{PhyloConfig, RANGER};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use strum::{Display, EnumString};

// ----------------------------------------------------------------------------
// Evidence Modules
// ----------------------------------------------------------------------------

/// Optional analyses selected with `--options`.
///
/// ```rust
/// use arts::cli::run::EvidenceModule;
/// assert_eq!("kres".parse::<EvidenceModule>()?, EvidenceModule::Kres);
/// assert_eq!(EvidenceModule::Phyl.to_string(), "phyl");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize, ValueEnum)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EvidenceModule {
    /// Phylogeny.
    Phyl,
    /// Known resistance models.
    Kres,
    /// Domains of unknown function.
    Duf,
    /// Expert core models (`coremodels_exp.hmm`).
    Expert,
}

// ----------------------------------------------------------------------------
// RunArgs
// ----------------------------------------------------------------------------

/// Start from a GenBank file and compare it with the pre-computed reference for
/// duplication, proximity and transfers.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
#[clap(verbatim_doc_comment)]
pub struct RunArgs {
    /// GenBank (or antiSMASH JSON) file to start the query, several files are comma separated.
    pub input: String,

    /// Directory of precomputed reference files.
    pub refdir: PathBuf,

    /// Hmm files used for core gene identification instead of the reference models, comma separated.
    #[clap(long, value_delimiter = ',')]
    pub hmmdblist: Vec<PathBuf>,

    /// Resistance models hmm file.
    #[clap(short = 'k', long)]
    pub knownhmms: Option<PathBuf>,

    /// Domains of unknown function hmm file.
    #[clap(short = 'd', long)]
    pub dufhmms: Option<PathBuf>,

    /// User supplied core models hmm file.
    #[clap(long)]
    pub custcorehmms: Option<PathBuf>,

    /// User supplied resistance models hmm file.
    #[clap(long)]
    pub customhmms: Option<PathBuf>,

    /// RNA hmm models to run.
    #[clap(long)]
    pub rnahmmdb: Option<PathBuf>,

    /// Core search reporting threshold.
    ///
    /// Model cutoffs: TC (trusted, default), GA (gathering), NC (noise), E1..E4 (90/75/50/30% of NC),
    /// or a global e-value.
    #[clap(short = 't', long)]
    pub thresh: Option<String>,

    /// Directory to create a unique results folder in.
    #[clap(long)]
    pub tempdir: Option<PathBuf>,

    /// Directory to store results.
    ///
    /// If the directory does not exist, it will be created.
    #[clap(short = 'o', long)]
    pub resultdir: Option<PathBuf>,

    /// Location of the ASTRAL jar, defaults to the value of the environment variable 'ASTRALJAR'.
    #[clap(long)]
    pub astral: Option<PathBuf>,

    /// RANGER-DTL executable.
    #[clap(long, default_value_t = RunArgs::default().ranger)]
    pub ranger: String,

    /// Number of CPU threads to use.
    #[clap(short = 'c', long, default_value_t = RunArgs::default().multicpu)]
    pub multicpu: usize,

    /// Analyses to run: phyl=phylogeny, kres=known resistance, duf=domains of unknown function, expert=expert core models.
    #[clap(long, value_enum, ignore_case = true, value_delimiter = ',', default_values_t = RunArgs::default().options)]
    pub options: Vec<EvidenceModule>,

    /// Explicitly specify the organism name.
    #[clap(long)]
    pub orgname: Option<String>,

    /// Directory of prebuilt trees.
    #[clap(long)]
    pub prebuilttrees: Option<PathBuf>,

    /// Run the input file through antiSMASH first.
    #[clap(long)]
    pub runantismash: bool,

    /// Location of the antiSMASH 'run_antismash.py' script.
    #[clap(long)]
    pub antismashpath: Option<PathBuf>,

    /// Time limit of the antiSMASH run, in seconds.
    #[clap(long, default_value_t = RunArgs::default().antismash_timeout)]
    pub antismash_timeout: u64,

    /// Location of the BiG-SCAPE 'bigscape.py' script.
    #[clap(long)]
    pub bigscapepath: Option<PathBuf>,

    /// Run the antiSMASH results of a batch through BiG-SCAPE.
    #[clap(long)]
    pub runbigscape: bool,

    /// Reference mean copy number above which a model is never a duplicate.
    #[clap(long, default_value_t = RunArgs::default().max_ref_count)]
    pub max_ref_count: f64,

    /// Reference relative standard deviation below which a model is never a duplicate.
    #[clap(long, default_value_t = RunArgs::default().min_rsd)]
    pub min_rsd: f64,
}

impl Default for RunArgs {
    fn default() -> Self {
        let duplication = DuplicationConfig::default();
        RunArgs {
            input: String::new(),
            refdir: PathBuf::new(),
            hmmdblist: Vec::new(),
            knownhmms: None,
            dufhmms: None,
            custcorehmms: None,
            customhmms: None,
            rnahmmdb: None,
            thresh: None,
            tempdir: None,
            resultdir: None,
            astral: None,
            ranger: RANGER.to_string(),
            multicpu: 1,
            options: vec![EvidenceModule::Phyl, EvidenceModule::Kres, EvidenceModule::Duf],
            orgname: None,
            prebuilttrees: None,
            runantismash: false,
            antismashpath: None,
            antismash_timeout: DEFAULT_TIMEOUT,
            bigscapepath: None,
            runbigscape: false,
            max_ref_count: duplication.max_ref_count,
            min_rsd: duplication.min_rsd,
        }
    }
}

impl RunArgs {
    pub fn new() -> Self {
        RunArgs::default()
    }

    /// Returns `true` if an optional analysis was selected.
    pub fn has(&self, module: EvidenceModule) -> bool {
        self.options.contains(&module)
    }

    pub fn duplication_config(&self) -> DuplicationConfig {
        DuplicationConfig { max_ref_count: self.max_ref_count, min_rsd: self.min_rsd }
    }

    pub fn phylo_config(&self) -> PhyloConfig {
        PhyloConfig {
            astral: self.astral.clone(),
            ranger: self.ranger.clone(),
            cpus: self.multicpu,
            prebuilt: self.prebuilttrees.clone().filter(|dir| dir.is_dir()),
            ..PhyloConfig::new(&self.refdir)
        }
    }

    /// The antiSMASH configuration, if a script location was given.
    pub fn antismash_config(&self) -> Option<AntismashConfig> {
        let path = self.antismashpath.as_ref()?;
        Some(AntismashConfig {
            cpus: self.multicpu,
            timeout: Duration::from_secs(self.antismash_timeout),
            ..AntismashConfig::new(path)
        })
    }
}
