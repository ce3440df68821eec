mod dispatcher;
mod protocol;
mod registry;
