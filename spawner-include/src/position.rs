use serde::{Deserialize, Serialize};

/// A tile coordinate on a host map.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self, width: usize, height: usize) -> bool {
        self.x < width && self.y < height
    }

    /// Offsets by `(dx, dy)`, `None` when the result would be negative.
    pub fn offset(&self, dx: isize, dy: isize) -> Option<Self> {
        Some(Self {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }

    /// The 8-neighbourhood, cardinals first. Upper bounds are the caller's
    /// concern.
    pub fn positions_around(&self) -> Vec<Position> {
        const DIRECTIONS: [(isize, isize); 8] = [
            (0, -1),
            (1, 0),
            (0, 1),
            (-1, 0),
            (-1, -1),
            (1, -1),
            (1, 1),
            (-1, 1),
        ];

        DIRECTIONS
            .iter()
            .filter_map(|&(dx, dy)| self.offset(dx, dy))
            .collect()
    }

    pub fn is_adjacent(&self, other: &Position) -> bool {
        self != other && self.x.abs_diff(other.x) <= 1 && self.y.abs_diff(other.y) <= 1
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(feature = "lua")]
mod lua {
    use mlua::prelude::*;

    use super::Position;

    impl FromLua for Position {
        fn from_lua(value: LuaValue, _lua: &Lua) -> LuaResult<Self> {
            match value {
                LuaValue::Table(t) => Ok(Position {
                    x: t.get("x")?,
                    y: t.get("y")?,
                }),
                other => Err(LuaError::FromLuaConversionError {
                    from: other.type_name(),
                    to: "Position".to_string(),
                    message: Some("expected a table with `x` and `y` fields".to_string()),
                }),
            }
        }
    }

    impl IntoLua for Position {
        fn into_lua(self, lua: &Lua) -> LuaResult<LuaValue> {
            let table = lua.create_table()?;
            table.set("x", self.x)?;
            table.set("y", self.y)?;
            Ok(LuaValue::Table(table))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_around_skips_negative_coordinates() {
        let corner = Position::new(0, 0);
        let around = corner.positions_around();
        assert_eq!(around.len(), 3);
        assert!(around.contains(&Position::new(1, 0)));
        assert!(around.contains(&Position::new(0, 1)));
        assert!(around.contains(&Position::new(1, 1)));

        let inner = Position::new(5, 5);
        let around = inner.positions_around();
        assert_eq!(around.len(), 8);
        assert!(around.iter().all(|p| p.is_adjacent(&inner)));
    }
}
