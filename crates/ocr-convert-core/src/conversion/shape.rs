//! Input tensor shape policy per task type.

use std::fmt;

use serde::Serialize;

use crate::catalog::TaskType;
use crate::config::CheckpointConfig;

/// Fixed recognition input height in pixels.
pub const RECOGNITION_HEIGHT: u32 = 48;

/// One dimension of an input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Dynamic,
    Fixed(u32),
}

impl Dim {
    /// Value in the converter's shape dictionary, `-1` meaning dynamic.
    pub fn as_i64(&self) -> i64 {
        match self {
            Dim::Dynamic => -1,
            Dim::Fixed(n) => i64::from(*n),
        }
    }
}

/// NCHW input shape handed to the converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputShape {
    dims: [Dim; 4],
}

impl InputShape {
    /// Shape for a task type.
    ///
    /// Detection takes dynamic batch, height and width. Recognition fixes the
    /// height at 48 and keeps batch and width dynamic.
    pub fn for_task(task: TaskType) -> Self {
        let dims = match task {
            TaskType::Detection => [Dim::Dynamic, Dim::Fixed(3), Dim::Dynamic, Dim::Dynamic],
            TaskType::Recognition => [
                Dim::Dynamic,
                Dim::Fixed(3),
                Dim::Fixed(RECOGNITION_HEIGHT),
                Dim::Dynamic,
            ],
        };
        Self { dims }
    }

    pub fn dims(&self) -> &[Dim; 4] {
        &self.dims
    }

    pub fn height(&self) -> Dim {
        self.dims[2]
    }

    pub fn width(&self) -> Dim {
        self.dims[3]
    }

    /// JSON shape dictionary keyed by the graph input name,
    /// e.g. `{"x": [-1, 3, 48, -1]}`.
    pub fn to_shape_dict(&self) -> String {
        format!("{{\"{}\": {}}}", CheckpointConfig::INPUT_NAME, self)
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.as_i64().to_string()).collect();
        write!(f, "[{}]", dims.join(", "))
    }
}

/// Human-readable shape documentation stored in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShapeNote {
    pub input_shape: String,
    pub notes: String,
}

impl ShapeNote {
    pub fn for_task(task: TaskType) -> Self {
        let notes = match task {
            TaskType::Detection => "Dynamic batch and spatial dimensions".to_string(),
            TaskType::Recognition => {
                format!("Fixed height of {RECOGNITION_HEIGHT}, dynamic width")
            }
        };
        Self {
            input_shape: InputShape::for_task(task).to_string(),
            notes,
        }
    }
}
