//! Build a namedtuple instance and decode it back into host values.

use pybridge::{logging, Value};

fn main() -> pybridge::Result<()> {
    logging::init();

    let collections = pybridge::import("collections")?;
    let class = collections.call("namedtuple", &[Value::from("X"), Value::from(vec!["a", "b"])])?;
    let instance = class.invoke(&[Value::Int(123), Value::Float(234.467)])?;

    println!("{}", instance);

    let fields = instance.value()?;
    let fields = fields.as_seq().unwrap_or_default();
    if let [a, b] = fields {
        println!("{}", a.as_i64().unwrap_or_default());
        println!("{}", b.as_f64().unwrap_or_default());
    }

    Ok(())
}
