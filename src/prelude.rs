pub use crate::data_structs::{
    AggregateKind,
    Bins,
    DistributionKind,
    ObjectiveKind,
    PeasResult,
    Region,
    ShuffleCount,
    Signal,
    Tail,
};
pub use crate::error::PeasError;
pub use crate::tools::choosing::{
    find_optimal_intervals,
    stitch_adjacent,
};
pub use crate::tools::dist::{
    NullDistribution,
    NullDistributionSet,
};
pub use crate::tools::null::{
    compute_number_of_permuted_data_points,
    PermutationSampler,
};
pub use crate::tools::peas::{
    PeaFinder,
    PeasConfig,
};
pub use crate::tools::scoring::{
    convert_pscores_to_pvals,
    SignificanceScorer,
};
pub use crate::tools::tables::{
    AggregateTableBuilder,
    DenominatorCache,
};
