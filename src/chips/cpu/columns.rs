//! CPU trace column definitions (6 columns)

/// Number of columns in the CPU trace
pub const CPU_NUM_COLUMNS: usize = 6;

/// One value per trace column, in commitment order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceColumns<T> {
    /// Program counter
    pub pc: T,
    pub opcode: T,
    /// Left operand
    pub x: T,
    /// Right operand
    pub y: T,
    /// Result
    pub z: T,
    /// Halt flag (1 on the halt row)
    pub halt: T,
}

/// Column selector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Column {
    Pc,
    Opcode,
    X,
    Y,
    Z,
    Halt,
}

impl Column {
    pub const ALL: [Column; CPU_NUM_COLUMNS] = [
        Column::Pc,
        Column::Opcode,
        Column::X,
        Column::Y,
        Column::Z,
        Column::Halt,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Pc => "pc",
            Column::Opcode => "opcode",
            Column::X => "x",
            Column::Y => "y",
            Column::Z => "z",
            Column::Halt => "halt",
        }
    }
}

impl<T> TraceColumns<T> {
    /// Number of columns in the CPU trace
    pub const NUM_COLUMNS: usize = CPU_NUM_COLUMNS;

    pub fn from_fn(mut f: impl FnMut(Column) -> T) -> Self {
        Self {
            pc: f(Column::Pc),
            opcode: f(Column::Opcode),
            x: f(Column::X),
            y: f(Column::Y),
            z: f(Column::Z),
            halt: f(Column::Halt),
        }
    }

    pub fn from_array([pc, opcode, x, y, z, halt]: [T; CPU_NUM_COLUMNS]) -> Self {
        Self {
            pc,
            opcode,
            x,
            y,
            z,
            halt,
        }
    }

    pub fn into_array(self) -> [T; CPU_NUM_COLUMNS] {
        [self.pc, self.opcode, self.x, self.y, self.z, self.halt]
    }

    pub fn as_array(&self) -> [&T; CPU_NUM_COLUMNS] {
        [&self.pc, &self.opcode, &self.x, &self.y, &self.z, &self.halt]
    }

    pub fn get(&self, column: Column) -> &T {
        match column {
            Column::Pc => &self.pc,
            Column::Opcode => &self.opcode,
            Column::X => &self.x,
            Column::Y => &self.y,
            Column::Z => &self.z,
            Column::Halt => &self.halt,
        }
    }

    pub fn get_mut(&mut self, column: Column) -> &mut T {
        match column {
            Column::Pc => &mut self.pc,
            Column::Opcode => &mut self.opcode,
            Column::X => &mut self.x,
            Column::Y => &mut self.y,
            Column::Z => &mut self.z,
            Column::Halt => &mut self.halt,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> TraceColumns<U> {
        TraceColumns::from_array(self.into_array().map(&mut f))
    }

    /// Columns paired with their selector, in commitment order
    pub fn iter(&self) -> impl Iterator<Item = (Column, &T)> {
        Column::ALL.into_iter().zip(self.as_array())
    }
}

impl<T: Send> TraceColumns<T> {
    /// Apply a fallible function to every column on the rayon pool
    pub fn par_try_map<U, E>(
        self,
        f: impl Fn(T) -> Result<U, E> + Sync + Send,
    ) -> Result<TraceColumns<U>, E>
    where
        U: Send,
        E: Send,
    {
        let [pc, opcode, x, y, z, halt] = self.into_array();
        let f = &f;
        let ((pc, opcode), ((x, y), (z, halt))) = rayon::join(
            || rayon::join(|| f(pc), || f(opcode)),
            || {
                rayon::join(
                    || rayon::join(|| f(x), || f(y)),
                    || rayon::join(|| f(z), || f(halt)),
                )
            },
        );
        Ok(TraceColumns {
            pc: pc?,
            opcode: opcode?,
            x: x?,
            y: y?,
            z: z?,
            halt: halt?,
        })
    }
}
