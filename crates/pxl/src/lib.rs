#![doc = include_str!("../../../README.md")]

mod args;
mod config;
mod dispatch;
mod engine;
mod environment;
mod error;
mod io;
pub mod marshal;
mod object;
mod proxy;

pub use mlua;

pub use crate::{
    args::{CallArgs, Kwargs},
    config::{DEFAULT_CLASS_MARKER, EngineConfig},
    dispatch::{CallKind, classify_callee},
    engine::EngineContext,
    environment::{Environment, require},
    error::{EngineError, Result},
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    marshal::{Returns, marshal_arg, marshal_args, marshal_result, marshal_results},
    object::{DictPairs, HostObject, Object},
    proxy::ValueProxy,
};
