pub mod bounds;
pub mod bundle;
pub mod compile;
pub mod criteria;
pub mod fetch;
pub mod ordered_id;
pub mod results;
pub mod review;
pub mod task;

mod error;

pub use bounds::{BoundingBox, BoundsPolicy};
pub use bundle::{BundleId, BundleRemoval, TaskBundle};
pub use compile::{CompileArgs, WireParams, compile, compile_criteria};
pub use criteria::{Direction, Page, SearchCriteria, Sort};
pub use error::{Error, Result};
pub use fetch::{FetchEnvelope, FetchSequencer, FetchStatus, GroupKey};
pub use ordered_id::{IdGenerator, MonotonicIds, OrderedId};
pub use results::{Applied, GroupResults, ResultCache};
pub use review::{
	NextTaskStrategy, ReviewEvent, ReviewPhase, ReviewQueues, ReviewSequenceState,
	ReviewTasksType, ReviewVerdict,
};
pub use task::{ChallengeId, REVIEW_STATUS_NOT_SET, Task, TaskId};
