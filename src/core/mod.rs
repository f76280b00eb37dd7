pub mod runtime_context;

pub use runtime_context::{
    FixedTimeProvider, IdGenerator, RuntimeContext, SequentialIdGenerator, SystemTimeProvider,
    TimeProvider, UuidGenerator,
};
