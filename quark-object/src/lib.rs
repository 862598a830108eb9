#![deny(unreachable_pub, unsafe_code)]
#![warn(
    clippy::all,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::empty_drop,
    clippy::empty_structs_with_brackets,
    clippy::exit,
    clippy::float_cmp_const,
    clippy::format_push_string,
    clippy::get_unwrap,
    clippy::if_then_some_else_none,
    clippy::large_include_file,
    clippy::let_underscore_must_use,
    clippy::lossy_float_literal,
    clippy::map_err_ignore,
    clippy::mem_forget,
    clippy::mixed_read_write_in_expression,
    clippy::multiple_inherent_impl,
    clippy::mutex_atomic,
    clippy::print_stderr,
    clippy::print_stdout,
    clippy::rc_buffer,
    clippy::rc_mutex,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::same_name_method,
    clippy::mod_module_files,
    clippy::str_to_string,
    clippy::string_slice,
    clippy::string_to_string,
    clippy::todo,
    clippy::try_err,
    clippy::unnecessary_self_imports,
    clippy::unneeded_field_pattern,
    clippy::use_debug
)]
#![doc(test(attr(deny(warnings))))]
#![doc = include_str!("../README.md")]

pub mod context;
pub mod dispatch;
pub mod dynamic;
mod error;
pub mod event_loop;
pub mod manageable;
pub mod object;
mod os;
pub mod property;
pub mod signal;
pub mod trace;

pub use self::{
    context::{Context, ObjectContext, ObjectMutex},
    dispatch::{dispatch, CallFuture, CallMode, Method, Receiver, ThreadingModel},
    dynamic::DynamicObject,
    error::{BoxError, Error, PropertyError},
    event_loop::{default_event_loop, EventLoop, ThreadPoolEventLoop},
    manageable::Manageable,
    object::{make_dynamic_object, Object, ObjectType, OnDelete},
    property::Property,
    signal::{Signal, SignalLink, Subscriber},
    trace::{EventTrace, MethodStatistics, TraceKind},
};
pub use quark_value as value;

pub type Result<T> = std::result::Result<T, Error>;
