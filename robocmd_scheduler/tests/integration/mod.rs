mod conditional;
mod groups;
